use embassy_stm32::dma::NoDma;
use embassy_stm32::gpio::{AnyPin, Output};
use embassy_stm32::spi::{self, Instance, Spi};
use embassy_time::{Duration, Timer};

// ── Registers (bank 0) ───────────────────────────────────────────────────────
const REG_DEVICE_CONFIG: u8 = 0x11;
const REG_ACCEL_DATA_X1: u8 = 0x1F;
const REG_PWR_MGMT0: u8 = 0x4E;
const REG_GYRO_CONFIG0: u8 = 0x4F;
const REG_ACCEL_CONFIG0: u8 = 0x50;
const REG_WHO_AM_I: u8 = 0x75;

const WHO_AM_I: u8 = 0x47;

/// ±2000 dps, 1 kHz ODR
const GYRO_CONFIG0: u8 = 0x06;
/// ±16 g, 1 kHz ODR
const ACCEL_CONFIG0: u8 = 0x06;

const GYRO_LSB_PER_DPS: f32 = 16.4;
const ACCEL_LSB_PER_G: f32 = 2048.0;

#[derive(Clone, Copy, Debug, defmt::Format)]
pub enum ImuError {
    Bus,
    UnknownDevice(u8),
}

impl From<spi::Error> for ImuError {
    fn from(_: spi::Error) -> Self {
        ImuError::Bus
    }
}

/// One accelerometer + gyroscope reading in physical units, body frame
#[derive(Clone, Copy, Default)]
pub struct ImuSample {
    pub accel_g: [f32; 3],
    pub gyro_rad_s: [f32; 3],
}

pub struct Icm42688<'d, T: Instance> {
    spi: Spi<'d, T, NoDma, NoDma>,
    cs: Output<'d, AnyPin>,
}

impl<'d, T: Instance> Icm42688<'d, T> {
    pub fn new(spi: Spi<'d, T, NoDma, NoDma>, cs: Output<'d, AnyPin>) -> Self {
        Self { spi, cs }
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), ImuError> {
        let buf = [reg & 0x7F, value];
        self.cs.set_low();
        let res = self.spi.blocking_write(&buf);
        self.cs.set_high();
        Ok(res?)
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, ImuError> {
        let tx = [reg | 0x80, 0x00];
        let mut rx = [0u8; 2];

        self.cs.set_low();
        let res = self.spi.blocking_transfer(&mut rx, &tx);
        self.cs.set_high();

        res?;
        Ok(rx[1])
    }

    pub async fn init(&mut self) -> Result<(), ImuError> {
        // Soft reset
        self.write_reg(REG_DEVICE_CONFIG, 0x01)?;
        Timer::after(Duration::from_millis(10)).await;

        let id = self.read_reg(REG_WHO_AM_I)?;
        if id != WHO_AM_I {
            return Err(ImuError::UnknownDevice(id));
        }

        self.write_reg(REG_GYRO_CONFIG0, GYRO_CONFIG0)?;
        self.write_reg(REG_ACCEL_CONFIG0, ACCEL_CONFIG0)?;

        // Gyro and accel in low-noise mode
        self.write_reg(REG_PWR_MGMT0, 0x0F)?;
        Timer::after(Duration::from_millis(50)).await;

        Ok(())
    }

    /// Burst-read accel and gyro, scaled to g and rad/s
    pub async fn read_sample(&mut self) -> Result<ImuSample, ImuError> {
        let mut tx = [0u8; 13];
        tx[0] = REG_ACCEL_DATA_X1 | 0x80;
        let mut rx = [0u8; 13];

        self.cs.set_low();
        let res = self.spi.blocking_transfer(&mut rx, &tx);
        self.cs.set_high();
        res?;

        let raw = |i: usize| i16::from_be_bytes([rx[i], rx[i + 1]]) as f32;

        Ok(ImuSample {
            accel_g: [
                raw(1) / ACCEL_LSB_PER_G,
                raw(3) / ACCEL_LSB_PER_G,
                raw(5) / ACCEL_LSB_PER_G,
            ],
            gyro_rad_s: [
                (raw(7) / GYRO_LSB_PER_DPS).to_radians(),
                (raw(9) / GYRO_LSB_PER_DPS).to_radians(),
                (raw(11) / GYRO_LSB_PER_DPS).to_radians(),
            ],
        })
    }
}
