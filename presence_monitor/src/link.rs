//! The radar as seen by the session core.
//!
//! [`SensorLink`] is the whole capability surface the core consumes. The HLK-LD2410
//! serial driver implements it, and so does [`crate::mock::MockLink`] for tests.

use std::fmt::Display;
use std::io::{Read, Write};

use hlk_ld2410::{Configuration, FirmwareVersion, Ld2410, Reading};

pub trait SensorLink {
    type Error: Display;

    /// Bring the link up. Called once, before the cyclic phase.
    fn connect(&mut self) -> Result<(), Self::Error>;

    /// Decode at most one pending frame. `Ok(false)` when nothing was pending.
    fn poll(&mut self) -> Result<bool, Self::Error>;

    fn is_connected(&self) -> bool;

    /// On success [`SensorLink::configuration`] holds the fetched values.
    fn request_configuration(&mut self) -> Result<(), Self::Error>;

    fn request_engineering_mode(&mut self) -> Result<(), Self::Error>;

    fn reading(&self) -> &Reading;

    fn configuration(&self) -> &Configuration;

    fn firmware(&self) -> Option<FirmwareVersion>;
}

impl<P: Read + Write> SensorLink for Ld2410<P> {
    type Error = hlk_ld2410::Error;

    fn connect(&mut self) -> Result<(), Self::Error> {
        Ld2410::connect(self)
    }

    fn poll(&mut self) -> Result<bool, Self::Error> {
        Ld2410::poll(self)
    }

    fn is_connected(&self) -> bool {
        Ld2410::is_connected(self)
    }

    fn request_configuration(&mut self) -> Result<(), Self::Error> {
        Ld2410::request_configuration(self).map(drop)
    }

    fn request_engineering_mode(&mut self) -> Result<(), Self::Error> {
        Ld2410::request_engineering_mode(self)
    }

    fn reading(&self) -> &Reading {
        Ld2410::reading(self)
    }

    fn configuration(&self) -> &Configuration {
        Ld2410::configuration(self)
    }

    fn firmware(&self) -> Option<FirmwareVersion> {
        Ld2410::firmware(self)
    }
}
