//! SSD1322 OLED driver (256x64, 4-bit grayscale)
//!
//! Drives the panel over 4-wire SPI with a separate data/command pin, using
//! the embedded-hal 1.0 traits so any HAL can supply the bus. Frames arrive as
//! [`PixelBuffer`]s and are packed two pixels per byte by
//! [`pack_gray4`](crate::display::pack_gray4), which also applies the 180°
//! rotation when the panel is mounted upside down.

use crate::canvas::PixelBuffer;
use crate::display::{
    check_frame_size, pack_gray4, DisplaySink, Rotation, SinkError, PANEL_HEIGHT, PANEL_WIDTH,
};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiDevice;
use log::info;

/// Column addresses of the 256 visible pixels (4 pixels per address).
const COLUMN_START: u8 = 0x1C;
const COLUMN_END: u8 = 0x5B;
const ROW_START: u8 = 0x00;
const ROW_END: u8 = 0x3F;

mod command {
    pub const SET_COMMAND_LOCK: u8 = 0xFD;
    pub const DISPLAY_OFF: u8 = 0xAE;
    pub const DISPLAY_ON: u8 = 0xAF;
    pub const CLOCK_DIVIDER: u8 = 0xB3;
    pub const MUX_RATIO: u8 = 0xCA;
    pub const DISPLAY_OFFSET: u8 = 0xA2;
    pub const START_LINE: u8 = 0xA1;
    pub const REMAP: u8 = 0xA0;
    pub const GPIO: u8 = 0xB5;
    pub const FUNCTION_SELECT: u8 = 0xAB;
    pub const DISPLAY_ENHANCEMENT_A: u8 = 0xB4;
    pub const CONTRAST: u8 = 0xC1;
    pub const MASTER_CURRENT: u8 = 0xC7;
    pub const DEFAULT_GRAYSCALE: u8 = 0xB9;
    pub const PHASE_LENGTH: u8 = 0xB1;
    pub const DISPLAY_ENHANCEMENT_B: u8 = 0xD1;
    pub const PRECHARGE_VOLTAGE: u8 = 0xBB;
    pub const SECOND_PRECHARGE: u8 = 0xB6;
    pub const VCOMH: u8 = 0xBE;
    pub const NORMAL_DISPLAY: u8 = 0xA6;
    pub const EXIT_PARTIAL: u8 = 0xA9;
    pub const COLUMN_ADDRESS: u8 = 0x15;
    pub const ROW_ADDRESS: u8 = 0x75;
    pub const WRITE_RAM: u8 = 0x5C;
}

/// Power-on register settings: command followed by its arguments.
const INIT_SEQUENCE: &[(u8, &[u8])] = &[
    (command::SET_COMMAND_LOCK, &[0x12]),
    (command::DISPLAY_OFF, &[]),
    (command::CLOCK_DIVIDER, &[0xF2]),
    (command::MUX_RATIO, &[0x3F]),
    (command::DISPLAY_OFFSET, &[0x00]),
    (command::START_LINE, &[0x00]),
    // Horizontal address increment, nibble remap, dual COM scan
    (command::REMAP, &[0x14, 0x11]),
    (command::GPIO, &[0x00]),
    // Internal VDD regulator
    (command::FUNCTION_SELECT, &[0x01]),
    (command::DISPLAY_ENHANCEMENT_A, &[0xA0, 0xFD]),
    (command::CONTRAST, &[0x7F]),
    (command::MASTER_CURRENT, &[0x0F]),
    (command::DEFAULT_GRAYSCALE, &[]),
    (command::PHASE_LENGTH, &[0xE2]),
    (command::DISPLAY_ENHANCEMENT_B, &[0x82, 0x20]),
    (command::PRECHARGE_VOLTAGE, &[0x1F]),
    (command::SECOND_PRECHARGE, &[0x08]),
    (command::VCOMH, &[0x07]),
    (command::NORMAL_DISPLAY, &[]),
    (command::EXIT_PARTIAL, &[]),
    (command::DISPLAY_ON, &[]),
];

/// SSD1322 panel on an SPI bus.
pub struct Ssd1322<SPI, DC, RST> {
    spi: SPI,
    dc: DC,
    rst: RST,
    rotation: Rotation,
}

impl<SPI, DC, RST> Ssd1322<SPI, DC, RST>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
{
    pub fn new(spi: SPI, dc: DC, rst: RST, rotation: Rotation) -> Self {
        Self {
            spi,
            dc,
            rst,
            rotation,
        }
    }

    /// Hardware reset followed by the register setup. Leaves the panel on and blank.
    pub fn init<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), SinkError> {
        self.rst.set_low().map_err(bus_error)?;
        delay.delay_ms(10);
        self.rst.set_high().map_err(bus_error)?;
        delay.delay_ms(10);

        for (cmd, args) in INIT_SEQUENCE {
            self.command(*cmd, args)?;
        }
        self.clear()?;
        info!("SSD1322 initialized ({:?})", self.rotation);
        Ok(())
    }

    fn command(&mut self, cmd: u8, args: &[u8]) -> Result<(), SinkError> {
        self.dc.set_low().map_err(bus_error)?;
        self.spi.write(&[cmd]).map_err(bus_error)?;
        if !args.is_empty() {
            self.data(args)?;
        }
        Ok(())
    }

    fn data(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        self.dc.set_high().map_err(bus_error)?;
        self.spi.write(bytes).map_err(bus_error)
    }

    fn write_ram(&mut self, packed: &[u8]) -> Result<(), SinkError> {
        self.command(command::COLUMN_ADDRESS, &[COLUMN_START, COLUMN_END])?;
        self.command(command::ROW_ADDRESS, &[ROW_START, ROW_END])?;
        self.command(command::WRITE_RAM, &[])?;
        self.data(packed)
    }

    /// Release the bus and pins.
    pub fn release(self) -> (SPI, DC, RST) {
        (self.spi, self.dc, self.rst)
    }
}

impl<SPI, DC, RST> DisplaySink for Ssd1322<SPI, DC, RST>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
{
    fn push_frame(&mut self, frame: &PixelBuffer) -> Result<(), SinkError> {
        check_frame_size(frame)?;
        let packed = pack_gray4(frame, self.rotation);
        self.write_ram(&packed)
    }

    fn clear(&mut self) -> Result<(), SinkError> {
        let blank = vec![0u8; (PANEL_WIDTH * PANEL_HEIGHT / 2) as usize];
        self.write_ram(&blank)
    }
}

fn bus_error<E: core::fmt::Debug>(e: E) -> SinkError {
    SinkError::Bus(format!("{:?}", e))
}
