use embassy_stm32::dma::NoDma;
use embassy_stm32::gpio::{AnyPin, Level, Output, Pin, Speed};
use embassy_stm32::i2c::I2c;
use embassy_stm32::peripherals::{DMA1_CH0, DMA1_CH7, I2C1, SPI1};
use embassy_stm32::rcc::*;
use embassy_stm32::spi::{Config as SpiConfig, Spi};
use embassy_stm32::time::Hertz as TimeHertz;
use embassy_stm32::{bind_interrupts, peripherals, Config};

use crate::drivers::hmc5883::Hmc5883;
use crate::drivers::icm42688::Icm42688;

bind_interrupts!(struct Irqs {
    I2C1_EV => embassy_stm32::i2c::EventInterruptHandler<peripherals::I2C1>;
    I2C1_ER => embassy_stm32::i2c::ErrorInterruptHandler<peripherals::I2C1>;
});

pub type MagI2c = I2c<'static, I2C1, DMA1_CH7, DMA1_CH0>;

/// Sensors and outputs the attitude node needs, already wired.
pub struct Board {
    pub imu: Icm42688<'static, SPI1>,
    pub mag: Hmc5883,
    pub mag_i2c: MagI2c,
    pub led: Output<'static, AnyPin>,
}

impl Board {
    pub fn init() -> Self {
        let mut config = Config::default();
        config.rcc.hse = Some(Hse {
            freq: TimeHertz(8_000_000),
            mode: HseMode::Oscillator,
        });
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL168,
            divp: Some(PllPDiv::DIV2), // 168 MHz
            divq: Some(PllQDiv::DIV7),
            divr: None,
        });
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;

        let p = embassy_stm32::init(config);

        // SPI1 @ 10 MHz: ICM-42688 (SCK=PA5, MOSI=PA7, MISO=PA6, CS=PB12)
        let mut spi_config = SpiConfig::default();
        spi_config.frequency = TimeHertz(10_000_000);
        let spi = Spi::new(p.SPI1, p.PA5, p.PA7, p.PA6, NoDma, NoDma, spi_config);
        let cs = Output::new(p.PB12.degrade(), Level::High, Speed::VeryHigh);

        // I2C1 @ 400 kHz: HMC5883L (SCL=PB8, SDA=PB9)
        let mag_i2c = I2c::new(
            p.I2C1,
            p.PB8,
            p.PB9,
            Irqs,
            p.DMA1_CH7,
            p.DMA1_CH0,
            TimeHertz(400_000),
            Default::default(),
        );

        let led = Output::new(p.PC13.degrade(), Level::High, Speed::Low);

        Self {
            imu: Icm42688::new(spi, cs),
            mag: Hmc5883::new(),
            mag_i2c,
            led,
        }
    }
}
