use embassy_stm32::i2c::{self, I2c, Instance, RxDma, TxDma};
use embassy_time::Timer;

pub const HMC5883L_ADDR: u8 = 0x1E;

/// Configuration Register A: 8-sample average, 75 Hz, normal measurement
const CONFIG_A: u8 = 0x78;
/// Configuration Register B: ±1.3 Ga
const CONFIG_B: u8 = 0x20;
const LSB_PER_GAUSS: f32 = 1090.0;

/// Reported on an axis when the ADC saturates
const OVERFLOW: i16 = -4096;

#[derive(Clone, Copy, Debug, defmt::Format)]
pub enum MagError {
    Bus,
    Overflow,
}

impl From<i2c::Error> for MagError {
    fn from(_: i2c::Error) -> Self {
        MagError::Bus
    }
}

pub struct Hmc5883;

impl Hmc5883 {
    pub fn new() -> Self {
        Self
    }

    pub async fn init<T: Instance, Tx: TxDma<T>, Rx: RxDma<T>>(
        &mut self,
        i2c: &mut I2c<'_, T, Tx, Rx>,
    ) -> Result<(), MagError> {
        i2c.blocking_write(HMC5883L_ADDR, &[0x00, CONFIG_A])?;
        i2c.blocking_write(HMC5883L_ADDR, &[0x01, CONFIG_B])?;

        // Mode Register: continuous measurement
        i2c.blocking_write(HMC5883L_ADDR, &[0x02, 0x00])?;

        Timer::after_millis(10).await;
        Ok(())
    }

    /// Magnetic field in gauss, body frame (axes assumed aligned with the IMU)
    pub async fn read_field<T: Instance, Tx: TxDma<T>, Rx: RxDma<T>>(
        &mut self,
        i2c: &mut I2c<'_, T, Tx, Rx>,
    ) -> Result<[f32; 3], MagError> {
        let mut data = [0u8; 6];
        i2c.blocking_write_read(HMC5883L_ADDR, &[0x03], &mut data)?;

        // Output registers are ordered X, Z, Y
        let x = i16::from_be_bytes([data[0], data[1]]);
        let z = i16::from_be_bytes([data[2], data[3]]);
        let y = i16::from_be_bytes([data[4], data[5]]);

        if x == OVERFLOW || y == OVERFLOW || z == OVERFLOW {
            return Err(MagError::Overflow);
        }

        Ok([
            x as f32 / LSB_PER_GAUSS,
            y as f32 / LSB_PER_GAUSS,
            z as f32 / LSB_PER_GAUSS,
        ])
    }
}
