//! Serial device transport for the radio dongle on the sender side.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::fd::AsFd;
use std::path::Path;

use anyhow::Context;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::termios::{self, BaudRate, ControlFlags, SetArg, SpecialCharacterIndices};

use airlift_core::transport::{Transport, TransportError};

/// Radio link behind a USB serial device. Modulation and RF parameters live
/// in the dongle firmware; only the device path and baud rate are set here.
pub struct SerialLink {
    file: File,
}

impl SerialLink {
    /// Open the device and switch it to raw mode at the given baud rate.
    pub fn open(device: &Path, baud: u32) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(device)
            .with_context(|| format!("opening serial device {}", device.display()))?;
        let mut tio = termios::tcgetattr(&file).context("reading terminal attributes")?;
        termios::cfmakeraw(&mut tio);
        termios::cfsetspeed(&mut tio, baud_rate(baud)?).context("setting baud rate")?;
        tio.control_flags |= ControlFlags::CLOCAL | ControlFlags::CREAD;
        // Polling reads: return immediately with whatever the driver holds.
        tio.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
        tio.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
        termios::tcsetattr(&file, SetArg::TCSANOW, &tio)
            .context("applying terminal attributes")?;
        Ok(Self { file })
    }
}

fn baud_rate(baud: u32) -> anyhow::Result<BaudRate> {
    Ok(match baud {
        9600 => BaudRate::B9600,
        19200 => BaudRate::B19200,
        38400 => BaudRate::B38400,
        57600 => BaudRate::B57600,
        115200 => BaudRate::B115200,
        230400 => BaudRate::B230400,
        other => anyhow::bail!("unsupported baud rate {other}"),
    })
}

impl Transport for SerialLink {
    fn bytes_available(&mut self) -> Result<bool, TransportError> {
        let mut fds = [PollFd::new(self.file.as_fd(), PollFlags::POLLIN)];
        let ready = poll(&mut fds, PollTimeout::ZERO).map_err(std::io::Error::from)?;
        Ok(ready > 0)
    }

    fn read_available(&mut self) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0u8; 4096];
        let n = self.file.read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.file.write_all(bytes)?;
        self.file.flush()?;
        Ok(())
    }
}
