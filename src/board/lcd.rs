//! HD44780 16x2 character LCD behind a PCF8574 I2C expander, 4 bit mode.

use esp_idf_svc::hal::{
    delay::{Ets, FreeRtos, BLOCK},
    i2c::I2cDriver,
};

use crate::{
    display::{TextDisplay, DISPLAY_COLUMNS, DISPLAY_ROWS},
    string_error::{StringError, StringEspError},
};

// PCF8574 bits
const RS: u8 = 0x01;
const EN: u8 = 0x04;
const BACKLIGHT: u8 = 0x08;

const CMD_CLEAR: u8 = 0x01;
const CMD_ENTRY_MODE: u8 = 0x06;
const CMD_DISPLAY_ON: u8 = 0x0C;
const CMD_FUNCTION_4BIT_2LINES: u8 = 0x28;
const CMD_SET_DDRAM: u8 = 0x80;

const ROW_OFFSETS: [u8; DISPLAY_ROWS as usize] = [0x00, 0x40];

pub struct Lcd<'a> {
    i2c: I2cDriver<'a>,
    address: u8,
}

impl<'a> Lcd<'a> {
    pub fn new(i2c: I2cDriver<'a>, address: u8) -> Result<Self, StringEspError> {
        let mut lcd = Self { i2c, address };
        lcd.init()?;
        Ok(lcd)
    }

    fn init(&mut self) -> Result<(), StringEspError> {
        FreeRtos::delay_ms(50);
        self.expander_write(0)?;

        // 8 bit mode three times, then switch to 4 bit
        for wait_ms in [5, 1, 1] {
            self.write_nibble(0x30, 0)?;
            FreeRtos::delay_ms(wait_ms);
        }
        self.write_nibble(0x20, 0)?;

        self.command(CMD_FUNCTION_4BIT_2LINES)?;
        self.command(CMD_DISPLAY_ON)?;
        self.command(CMD_CLEAR)?;
        FreeRtos::delay_ms(2);
        self.command(CMD_ENTRY_MODE)
    }

    fn expander_write(&mut self, data: u8) -> Result<(), StringEspError> {
        self.i2c
            .write(self.address, &[data | BACKLIGHT], BLOCK)
            .map_err(|e| StringEspError("LCD write failed", e))
    }

    fn write_nibble(&mut self, nibble: u8, mode: u8) -> Result<(), StringEspError> {
        let data = (nibble & 0xF0) | mode;

        self.expander_write(data | EN)?;
        Ets::delay_us(1);
        self.expander_write(data)?;
        Ets::delay_us(50);
        Ok(())
    }

    fn send(&mut self, value: u8, mode: u8) -> Result<(), StringEspError> {
        self.write_nibble(value & 0xF0, mode)?;
        self.write_nibble(value << 4, mode)
    }

    fn command(&mut self, command: u8) -> Result<(), StringEspError> {
        self.send(command, 0)
    }
}

impl<'a> TextDisplay for Lcd<'a> {
    fn write_line(&mut self, row: u8, text: &str) -> anyhow::Result<()> {
        let offset = ROW_OFFSETS
            .get(row as usize)
            .ok_or(StringError("LCD row out of range"))?;

        self.command(CMD_SET_DDRAM | offset)?;

        let mut chars = text.chars();
        for _ in 0..DISPLAY_COLUMNS {
            let c = match chars.next() {
                Some(c) if c.is_ascii() => c as u8,
                Some(_) => b'?',
                None => b' ',
            };
            self.send(c, RS)?;
        }

        Ok(())
    }
}
