use log::{debug, info};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use crate::{
    bitmap::Bitmap,
    error::Error,
    frame::{self, Response, OP_FEED_LINE, OP_RASTER_CHUNK},
    raster::{self, InkThreshold, RgbaSource},
    transport::Transport,
    DEFAULT_CHUNK_ROWS, DEFAULT_FEED_DOTS, DOT_WIDTH, READ_CAPACITY,
};

/// Print job settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    dot_width: u32,
    chunk_rows: usize,
    feed_dots: u16,
    read_reply: bool,
    threshold: InkThreshold,
}

impl Config {
    /// Initialize configuration data with default values.
    ///
    /// 576 dots per row, 16 rows per frame, 300 dots of feed after the
    /// image, no reply reads, alpha-aware ink threshold.
    ///
    /// # Example
    ///
    /// ```
    /// use thermal_usb::{Config, InkThreshold};
    ///
    /// let config = Config::new()
    ///     .chunk_rows(32)
    ///     .threshold(InkThreshold::legacy());
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn new() -> Config {
        Config {
            dot_width: DOT_WIDTH,
            chunk_rows: DEFAULT_CHUNK_ROWS,
            feed_dots: DEFAULT_FEED_DOTS,
            read_reply: false,
            threshold: InkThreshold::default(),
        }
    }

    pub fn dot_width(self, dot_width: u32) -> Self {
        Config { dot_width, ..self }
    }

    /// Rows packed into each raster frame.
    pub fn chunk_rows(self, chunk_rows: usize) -> Self {
        Config { chunk_rows, ..self }
    }

    /// Dots of paper to advance once the image is sent.
    pub fn feed_dots(self, feed_dots: u16) -> Self {
        Config { feed_dots, ..self }
    }

    /// Read and decode a reply after every frame.
    pub fn read_reply(self, read_reply: bool) -> Self {
        Config { read_reply, ..self }
    }

    pub fn threshold(self, threshold: InkThreshold) -> Self {
        Config { threshold, ..self }
    }

    /// Reject settings that could never produce a valid frame.
    pub fn validate(&self) -> Result<(), Error> {
        if self.dot_width == 0 || self.dot_width % 8 != 0 {
            return Err(Error::InvalidWidth(self.dot_width));
        }
        if self.chunk_rows == 0 {
            return Err(Error::InvalidConfig("chunk rows must be positive".to_string()));
        }
        let chunk_bytes = (self.dot_width / 8) as usize * self.chunk_rows;
        if chunk_bytes > frame::MAX_PAYLOAD {
            return Err(Error::InvalidConfig(format!(
                "{} rows of {} dots make a {} byte chunk, limit is {}",
                self.chunk_rows,
                self.dot_width,
                chunk_bytes,
                frame::MAX_PAYLOAD
            )));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Flag used to stop a job between frames.
///
/// A cancel stops exactly one job: the one running, or the next one if the
/// printer is idle. The job that observes it clears the flag. Frames already
/// handed to the transport are not recalled; the printer is left mid-image
/// and the job has to be re-run from the start.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Drop a pending cancel without running a job.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// Sequences frames for a print job onto a transport it owns.
pub struct Printer<T: Transport> {
    transport: T,
    config: Config,
    cancel: CancelToken,
}

impl<T: Transport> Printer<T> {
    pub fn new(transport: T, config: Config) -> Result<Self, Error> {
        config.validate()?;
        debug!("{:?}", config);
        Ok(Printer {
            transport,
            config,
            cancel: CancelToken::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Use an existing token, e.g. one shared with a UI thread.
    pub fn with_cancel_token(self, cancel: CancelToken) -> Self {
        Printer { cancel, ..self }
    }

    /// Replace the token in place, e.g. behind a [`SharedPrinter`].
    pub fn set_cancel_token(&mut self, cancel: CancelToken) {
        self.cancel = cancel;
    }

    /// Token that stops the running job, or the next one if idle.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Give the transport back, e.g. to close it.
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Send one raster chunk.
    pub fn send_chunk(&mut self, chunk: &[u8]) -> Result<Option<Response>, Error> {
        self.send(OP_RASTER_CHUNK, chunk)
    }

    /// Advance the paper by `dots` dots.
    pub fn send_feed(&mut self, dots: u16) -> Result<Option<Response>, Error> {
        self.send(OP_FEED_LINE, &frame::feed_payload(dots))
    }

    /// Pack `bitmap` into chunks and print them top to bottom, then feed.
    ///
    /// The bitmap is padded to a whole number of chunks as a side effect.
    pub fn print_bitmap(&mut self, bitmap: &mut Bitmap, chunk_rows: usize) -> Result<(), Error> {
        if chunk_rows == 0 {
            return Err(Error::InvalidConfig("chunk rows must be positive".to_string()));
        }
        if bitmap.width() != self.config.dot_width {
            return Err(Error::DimensionMismatch {
                expected: self.config.dot_width,
                actual: bitmap.width(),
            });
        }
        let rows = bitmap.height();
        let chunks = bitmap.pack(chunk_rows);
        info!(
            "printing {} rows as {} chunks of {} rows",
            rows,
            chunks.len(),
            chunk_rows
        );
        self.print_chunks(chunks)
    }

    /// Print pre-packed chunks in the order given, then feed.
    pub fn print_chunks<I>(&mut self, chunks: I) -> Result<(), Error>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        for chunk in chunks {
            self.check_cancelled()?;
            self.send_chunk(chunk.as_ref())?;
        }
        self.check_cancelled()?;
        let dots = self.config.feed_dots;
        self.send_feed(dots)?;
        debug!("print job complete");
        Ok(())
    }

    /// Rasterise `image` with the configured threshold and print it.
    pub fn print_image<S: RgbaSource + ?Sized>(&mut self, image: &S) -> Result<(), Error> {
        let threshold = self.config.threshold;
        let mut bitmap = raster::convert(image, self.config.dot_width, |px| {
            threshold.is_inked(px)
        })?;
        let chunk_rows = self.config.chunk_rows;
        self.print_bitmap(&mut bitmap, chunk_rows)
    }

    fn check_cancelled(&self) -> Result<(), Error> {
        if self.cancel.take() {
            info!("print job cancelled");
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    fn send(&mut self, opcode: u16, payload: &[u8]) -> Result<Option<Response>, Error> {
        let buf = frame::encode(opcode, payload)?;
        debug!("write frame {:#06X}, {} byte payload", opcode, payload.len());
        let written = self.transport.write(&buf)?;
        if written != buf.len() {
            return Err(Error::ShortWrite {
                written,
                expected: buf.len(),
            });
        }

        if !self.config.read_reply {
            return Ok(None);
        }
        let raw = self.transport.read(READ_CAPACITY)?;
        let reply = frame::decode(&raw);
        if let Some(response) = &reply {
            debug!("reply {:?}", response);
        }
        Ok(reply)
    }
}

/// A printer behind a single-slot lock, so jobs from several call sites
/// never interleave their frames.
pub struct SharedPrinter<T: Transport> {
    inner: Arc<Mutex<Printer<T>>>,
}

impl<T: Transport> Clone for SharedPrinter<T> {
    fn clone(&self) -> Self {
        SharedPrinter {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> SharedPrinter<T> {
    pub fn new(printer: Printer<T>) -> Self {
        SharedPrinter {
            inner: Arc::new(Mutex::new(printer)),
        }
    }

    /// Run `job` with exclusive access to the printer.
    pub fn with<R>(&self, job: impl FnOnce(&mut Printer<T>) -> R) -> R {
        // a panicked job leaves the printer state unknown either way
        let mut printer = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        job(&mut *printer)
    }

    pub fn print_bitmap(&self, bitmap: &mut Bitmap, chunk_rows: usize) -> Result<(), Error> {
        self.with(|printer| printer.print_bitmap(bitmap, chunk_rows))
    }

    pub fn print_image<S: RgbaSource + ?Sized>(&self, image: &S) -> Result<(), Error> {
        self.with(|printer| printer.print_image(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Sink {
        frames: Vec<Vec<u8>>,
    }

    impl Transport for Sink {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
            self.frames.push(buf.to_vec());
            Ok(buf.len())
        }

        fn read(&mut self, _max_bytes: usize) -> Result<Vec<u8>, Error> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dot_width, 576);
        assert_eq!(config.chunk_rows, 16);
        assert_eq!(config.feed_dots, 300);
        assert!(!config.read_reply);
        assert_eq!(config.threshold, InkThreshold::alpha_aware());
    }

    #[test]
    fn rejects_oversized_chunks() {
        // 72 bytes per row, 910 rows = 65520 bytes fits, 911 does not
        assert!(Config::new().chunk_rows(910).validate().is_ok());
        assert!(matches!(
            Config::new().chunk_rows(911).validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            Config::new().chunk_rows(0).validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            Config::new().dot_width(100).validate(),
            Err(Error::InvalidWidth(100))
        ));
        assert!(Printer::new(Sink::default(), Config::new().chunk_rows(0)).is_err());
    }

    #[test]
    fn cancel_before_start_sends_nothing() {
        let mut printer = Printer::new(Sink::default(), Config::new()).unwrap();
        printer.cancel_token().cancel();
        let mut bitmap = Bitmap::new(576, 32).unwrap();
        assert!(matches!(
            printer.print_bitmap(&mut bitmap, 16),
            Err(Error::Cancelled)
        ));
        assert!(printer.into_inner().frames.is_empty());
    }

    #[test]
    fn cancel_applies_to_one_job() {
        let shared = SharedPrinter::new(Printer::new(Sink::default(), Config::new()).unwrap());
        let token = shared.with(|printer| printer.cancel_token());
        token.cancel();

        let mut first = Bitmap::new(576, 16).unwrap();
        assert!(matches!(
            shared.print_bitmap(&mut first, 16),
            Err(Error::Cancelled)
        ));
        assert!(!token.is_cancelled());

        let mut second = Bitmap::new(576, 16).unwrap();
        shared.print_bitmap(&mut second, 16).unwrap();
        assert_eq!(shared.with(|printer| printer.transport.frames.len()), 2);
    }

    #[test]
    fn reset_and_replace_token() {
        let mut printer = Printer::new(Sink::default(), Config::new()).unwrap();
        let token = printer.cancel_token();
        token.cancel();
        token.reset();
        printer.print_chunks(Vec::<Vec<u8>>::new()).unwrap();

        let fresh = CancelToken::new();
        printer.set_cancel_token(fresh.clone());
        fresh.cancel();
        assert!(matches!(
            printer.print_chunks(vec![vec![0u8; 72]]),
            Err(Error::Cancelled)
        ));
        // the old token no longer reaches this printer
        token.cancel();
        printer.print_chunks(vec![vec![0u8; 72]]).unwrap();
        assert_eq!(printer.into_inner().frames.len(), 3);
    }

    #[test]
    fn zero_chunk_rows_is_an_error() {
        let shared = SharedPrinter::new(Printer::new(Sink::default(), Config::new()).unwrap());
        let mut bitmap = Bitmap::new(576, 16).unwrap();
        assert!(matches!(
            shared.print_bitmap(&mut bitmap, 0),
            Err(Error::InvalidConfig(_))
        ));
        // the lock is still usable and nothing went out
        shared.print_bitmap(&mut bitmap, 16).unwrap();
        assert_eq!(shared.with(|printer| printer.transport.frames.len()), 2);
        assert_eq!(bitmap.height(), 16);
    }

    #[test]
    fn bitmap_width_must_match() {
        let mut printer = Printer::new(Sink::default(), Config::new()).unwrap();
        let mut bitmap = Bitmap::new(384, 16).unwrap();
        assert!(matches!(
            printer.print_bitmap(&mut bitmap, 16),
            Err(Error::DimensionMismatch { .. })
        ));
        assert!(printer.into_inner().frames.is_empty());
    }

    #[test]
    fn shared_printer_serialises_jobs() {
        let shared = SharedPrinter::new(Printer::new(Sink::default(), Config::new()).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    let mut bitmap = Bitmap::new(576, 48).unwrap();
                    shared.print_bitmap(&mut bitmap, 16).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let frames = shared.with(|printer| std::mem::take(&mut printer.transport.frames));
        assert_eq!(frames.len(), 16);
        // each job is three chunks then a feed, never interleaved
        for job in frames.chunks(4) {
            assert!(job[..3].iter().all(|f| f[1..3] == [0x00, 0x01]));
            assert_eq!(job[3][1..3], [0x1A, 0x00]);
        }
    }
}
