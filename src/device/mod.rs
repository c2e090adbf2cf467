/// Serial command channel to the auxiliary power supply.
///
/// The channel exclusively owns the port handle. Open/close is explicit and
/// toggled by the user; nothing is ever retried, since repeating a command to
/// a power supply is not safe.
pub mod command;

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::time::Duration;

use crate::config::SerialSettings;
use crate::error::ChannelError;

pub use command::{Dialect, MaxRatings, PowerSupplyCommand, TERMINATOR, printable};

/// Upper bound on trailing lines drained after a query.
const MAX_DRAIN_LINES: usize = 8;

/// Console lines kept; older ones are dropped first.
pub const MAX_TRANSCRIPT_LINES: usize = 500;

/// Anything the channel can talk through: a real port or a test double.
pub trait Link: Read + Write + Send {}

impl<T: Read + Write + Send + ?Sized> Link for T {}

// ---------------------------------------------------------------------------
// Console transcript
// ---------------------------------------------------------------------------

/// One line in the serial console shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEntry {
    Sent(String),
    Received(String),
    Note(String),
}

impl std::fmt::Display for TranscriptEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptEntry::Sent(s) => write!(f, "sent: {s}"),
            TranscriptEntry::Received(s) => write!(f, "recv: {s}"),
            TranscriptEntry::Note(s) => f.write_str(s),
        }
    }
}

// ---------------------------------------------------------------------------
// DeviceCommandChannel
// ---------------------------------------------------------------------------

pub struct DeviceCommandChannel {
    settings: SerialSettings,
    link: Option<Box<dyn Link>>,
    transcript: VecDeque<TranscriptEntry>,
}

impl DeviceCommandChannel {
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            settings,
            link: None,
            transcript: VecDeque::new(),
        }
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    pub fn transcript(&self) -> &VecDeque<TranscriptEntry> {
        &self.transcript
    }

    fn record(&mut self, entry: TranscriptEntry) {
        if self.transcript.len() == MAX_TRANSCRIPT_LINES {
            self.transcript.pop_front();
        }
        self.transcript.push_back(entry);
    }

    fn note(&mut self, text: impl Into<String>) {
        self.record(TranscriptEntry::Note(text.into()));
    }

    /// Choose the port used by the next open.
    pub fn select_port(&mut self, port: String) {
        log::info!("Serial port selected: {port}");
        self.settings.port = Some(port);
    }

    pub fn set_dialect(&mut self, dialect: Dialect) {
        self.settings.dialect = dialect;
    }

    /// Names of the serial ports present on this machine.
    pub fn available_ports() -> Vec<String> {
        match serialport::available_ports() {
            Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
            Err(e) => {
                log::warn!("Could not enumerate serial ports: {e}");
                Vec::new()
            }
        }
    }

    /// Open if closed, close if open. Returns whether the port is now open.
    pub fn toggle(&mut self) -> Result<bool, ChannelError> {
        if self.is_open() {
            self.close();
            Ok(false)
        } else {
            self.open()?;
            Ok(true)
        }
    }

    /// Open the selected port. Already open is a no-op.
    pub fn open(&mut self) -> Result<(), ChannelError> {
        if self.is_open() {
            return Ok(());
        }
        let port_name = self.settings.port.clone().ok_or(ChannelError::NoPortSelected)?;
        let result = serialport::new(&port_name, self.settings.baud_rate)
            .timeout(Duration::from_millis(self.settings.timeout_ms))
            .open();
        match result {
            Ok(port) => {
                self.attach(Box::new(port));
                self.note(format!("connected {port_name}"));
                Ok(())
            }
            Err(source) => {
                self.note(format!(
                    "could not open {port_name}; is another program using it?"
                ));
                Err(ChannelError::Open {
                    port: port_name,
                    source,
                })
            }
        }
    }

    /// Take ownership of an already opened link.
    pub fn attach(&mut self, link: Box<dyn Link>) {
        self.link = Some(link);
        log::info!("Serial link opened");
    }

    pub fn close(&mut self) {
        if self.link.take().is_some() {
            self.note("disconnected serial");
            log::info!("Serial link closed");
        }
    }

    fn link(&mut self) -> Result<&mut Box<dyn Link>, ChannelError> {
        self.link.as_mut().ok_or(ChannelError::NotConnected)
    }

    /// Write raw bytes and flush. Fails once on error; never retried.
    pub fn send(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        if !self.is_open() {
            self.note("no connection");
            return Err(ChannelError::NotConnected);
        }
        let text = printable(bytes);
        let link = self.link()?;
        log::trace!("serial -> '{text}'");
        let written = link.write_all(bytes).and_then(|()| link.flush());
        match written {
            Ok(()) => {
                self.record(TranscriptEntry::Sent(text));
                Ok(())
            }
            Err(e) => {
                log::error!("Serial write failed: {e}");
                self.note(format!("write failed: {e}"));
                Err(e.into())
            }
        }
    }

    /// Read until `terminator` (inclusive), end of stream or read timeout.
    ///
    /// Whatever arrived before a timeout is returned; an empty vector means
    /// nothing was received.
    pub fn read_until(&mut self, terminator: u8) -> Result<Vec<u8>, ChannelError> {
        let link = self.link()?;
        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match link.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    out.push(byte[0]);
                    if byte[0] == terminator {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::error!("Serial read failed: {e}");
                    return Err(e.into());
                }
            }
        }
        if !out.is_empty() {
            let text = printable(&out);
            log::trace!("serial <- '{text}'");
            self.record(TranscriptEntry::Received(text));
        }
        Ok(out)
    }

    /// Encode and send one command. Supplies that acknowledge get their reply
    /// line read back and returned.
    ///
    /// Supplies that do not acknowledge may still answer typed commands or a
    /// stop; for those, one line is read with the port timeout and returned
    /// when anything arrived.
    pub fn issue(&mut self, command: &PowerSupplyCommand) -> Result<Option<Vec<u8>>, ChannelError> {
        let bytes = command.encode(self.settings.dialect, self.settings.address)?;
        self.send(&bytes)?;
        if self.settings.dialect.acknowledges() {
            return Ok(Some(self.read_until(TERMINATOR)?));
        }
        match command {
            PowerSupplyCommand::Raw(_) | PowerSupplyCommand::Stop => {
                let reply = self.read_until(TERMINATOR)?;
                Ok((!reply.is_empty()).then_some(reply))
            }
            _ => Ok(None),
        }
    }

    /// Send a query and return its first reply line, draining any trailer.
    pub fn query(&mut self, command: &PowerSupplyCommand) -> Result<Vec<u8>, ChannelError> {
        let bytes = command.encode(self.settings.dialect, self.settings.address)?;
        self.send(&bytes)?;
        let first = self.read_until(TERMINATOR)?;
        for _ in 0..MAX_DRAIN_LINES {
            if self.read_until(TERMINATOR)?.is_empty() {
                break;
            }
        }
        Ok(first)
    }

    /// Maximum voltage and current of a BK supply.
    pub fn max_ratings(&mut self) -> Result<MaxRatings, ChannelError> {
        let reply = self.query(&PowerSupplyCommand::QueryMaxRatings)?;
        let ratings = MaxRatings::parse(&reply)?;
        self.note(format!(
            "{} amps maximum, {} volts maximum",
            ratings.amps, ratings.volts
        ));
        Ok(ratings)
    }

    /// Connect the outputs (where the dialect needs it) and start the
    /// configured program.
    pub fn start_program(&mut self) -> Result<(), ChannelError> {
        if !self.is_open() {
            self.note("no connection");
            return Err(ChannelError::NotConnected);
        }
        if self.settings.dialect == Dialect::BkPrecision {
            self.issue(&PowerSupplyCommand::OutputOn)?;
        }
        let slot = self.settings.program_slot;
        self.issue(&PowerSupplyCommand::Run { slot })?;
        Ok(())
    }

    /// Stop the supply, opening the port first if it is closed.
    pub fn emergency_stop(&mut self) -> Result<(), ChannelError> {
        self.open()?;
        self.issue(&PowerSupplyCommand::Stop)?;
        log::warn!("Emergency stop sent to power supply");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// In-memory link: records writes, replays scripted input.
    #[derive(Clone, Default)]
    struct MemoryLink {
        written: Arc<Mutex<Vec<u8>>>,
        input: Arc<Mutex<VecDeque<u8>>>,
        fail_writes: bool,
    }

    impl Read for MemoryLink {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut input = self.input.lock().unwrap();
            match input.pop_front() {
                Some(b) => {
                    buf[0] = b;
                    Ok(1)
                }
                None => Err(io::Error::new(io::ErrorKind::TimedOut, "timeout")),
            }
        }
    }

    impl Write for MemoryLink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
            }
            self.written.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn channel_with(link: &MemoryLink, dialect: Dialect) -> DeviceCommandChannel {
        let mut ch = DeviceCommandChannel::new(SerialSettings {
            dialect,
            ..SerialSettings::default()
        });
        ch.attach(Box::new(link.clone()));
        ch
    }

    fn script(link: &MemoryLink, bytes: &[u8]) {
        link.input.lock().unwrap().extend(bytes.iter().copied());
    }

    #[test]
    fn send_while_closed_reports_not_connected() {
        let mut ch = DeviceCommandChannel::new(SerialSettings::default());
        assert!(matches!(ch.send(b"STOP00\r"), Err(ChannelError::NotConnected)));
        assert!(matches!(ch.start_program(), Err(ChannelError::NotConnected)));
    }

    #[test]
    fn open_without_port_is_refused() {
        let mut ch = DeviceCommandChannel::new(SerialSettings::default());
        assert!(matches!(ch.toggle(), Err(ChannelError::NoPortSelected)));
        assert!(!ch.is_open());
    }

    #[test]
    fn toggle_closes_an_open_link() {
        let link = MemoryLink::default();
        let mut ch = channel_with(&link, Dialect::BkPrecision);
        assert!(!ch.toggle().unwrap());
        assert!(!ch.is_open());
    }

    #[test]
    fn bk_program_start_sends_output_then_run() {
        let link = MemoryLink::default();
        script(&link, b"OK\rOK\r");
        let mut ch = channel_with(&link, Dialect::BkPrecision);
        ch.start_program().unwrap();
        assert_eq!(&*link.written.lock().unwrap(), b"SOUT000\rRUNP000001\r");
        assert!(ch
            .transcript()
            .contains(&TranscriptEntry::Received("OK\\r".into())));
    }

    #[test]
    fn read_until_returns_partial_on_timeout() {
        let link = MemoryLink::default();
        script(&link, b"12");
        let mut ch = channel_with(&link, Dialect::BkPrecision);
        assert_eq!(ch.read_until(TERMINATOR).unwrap(), b"12");
        assert!(ch.read_until(TERMINATOR).unwrap().is_empty());
    }

    #[test]
    fn max_ratings_query_drains_trailer() {
        let link = MemoryLink::default();
        script(&link, b"180200\rOK\r");
        let mut ch = channel_with(&link, Dialect::BkPrecision);
        let r = ch.max_ratings().unwrap();
        assert_eq!(r.volts, 18.0);
        assert!(link.input.lock().unwrap().is_empty());
    }

    #[test]
    fn failed_write_surfaces_once() {
        let link = MemoryLink {
            fail_writes: true,
            ..MemoryLink::default()
        };
        let mut ch = channel_with(&link, Dialect::Mastech);
        assert!(matches!(
            ch.issue(&PowerSupplyCommand::Run { slot: 2 }),
            Err(ChannelError::Io(_))
        ));
        assert!(link.written.lock().unwrap().is_empty());
    }

    #[test]
    fn mastech_stop_is_a_bare_escape() {
        let link = MemoryLink::default();
        let mut ch = channel_with(&link, Dialect::Mastech);
        ch.emergency_stop().unwrap();
        assert_eq!(&*link.written.lock().unwrap(), &[0x1b]);
    }

    #[test]
    fn mastech_console_reply_reaches_transcript() {
        let link = MemoryLink::default();
        script(&link, b"V=12.0\r");
        let mut ch = channel_with(&link, Dialect::Mastech);
        let reply = ch.issue(&PowerSupplyCommand::Raw("V?".into())).unwrap();
        assert_eq!(reply.as_deref(), Some(&b"V=12.0\r"[..]));
        assert_eq!(
            ch.transcript().back(),
            Some(&TranscriptEntry::Received("V=12.0\\r".into()))
        );
        assert!(link.input.lock().unwrap().is_empty());
    }

    #[test]
    fn mastech_silent_supply_gives_no_reply() {
        let link = MemoryLink::default();
        let mut ch = channel_with(&link, Dialect::Mastech);
        assert_eq!(ch.issue(&PowerSupplyCommand::Raw("V?".into())).unwrap(), None);
        assert_eq!(ch.issue(&PowerSupplyCommand::Run { slot: 1 }).unwrap(), None);
        assert!(!ch
            .transcript()
            .iter()
            .any(|e| matches!(e, TranscriptEntry::Received(_))));
    }

    #[test]
    fn transcript_keeps_most_recent_lines() {
        let link = MemoryLink::default();
        let mut ch = channel_with(&link, Dialect::Mastech);
        for i in 0..MAX_TRANSCRIPT_LINES + 20 {
            ch.send(format!("L{i}\r").as_bytes()).unwrap();
        }
        assert_eq!(ch.transcript().len(), MAX_TRANSCRIPT_LINES);
        assert_eq!(ch.transcript().front(), Some(&TranscriptEntry::Sent("L20\\r".into())));
        let last = format!("L{}\\r", MAX_TRANSCRIPT_LINES + 19);
        assert_eq!(ch.transcript().back(), Some(&TranscriptEntry::Sent(last)));
    }
}
