use log::{debug, info, warn};
use rusb::{
    Context, Device, DeviceDescriptor, DeviceHandle, Direction, TransferType, UsbContext,
};
use std::{sync::Mutex, thread, time::Duration};

use crate::{
    backend::PrintBackend,
    bitmap::Bitmap,
    error::Error,
    media::Media,
    model::Model,
    raster::RasterEncoder,
    render::{render_text, RenderOptions},
    status::{port_status_request_type, PortStatus, StatusPolicy, GET_PORT_STATUS},
    BROTHER_VENDOR_ID,
};

#[derive(Debug, Clone, Copy)]
struct Endpoint {
    config: u8,
    iface: u8,
    setting: u8,
    address: u8,
    max_packet_size: u16,
}

/// USB transport settings.
///
/// Built from a printer model and media, then adjusted with the builder
/// methods.
///
/// ```
/// use labelprint::{Media, Model, StatusPolicy, UsbConfig};
/// use std::time::Duration;
///
/// let config = UsbConfig::new(Model::QL810W, Media::Continuous62)
///     .chunked(true)
///     .chunk_delay(Duration::from_millis(5))
///     .status_policy(StatusPolicy::Warn);
/// assert_eq!(config.product_id(), 0x209C);
/// ```
#[derive(Debug, Clone)]
pub struct UsbConfig {
    vendor_id: u16,
    product_id: u16,
    serial: Option<String>,
    chunked: bool,
    chunk_delay: Duration,
    timeout: Duration,
    status_policy: StatusPolicy,
    render: RenderOptions,
    encoder: RasterEncoder,
}

impl UsbConfig {
    pub fn new(model: Model, media: Media) -> UsbConfig {
        UsbConfig {
            vendor_id: BROTHER_VENDOR_ID,
            product_id: model.pid(),
            serial: None,
            chunked: false,
            chunk_delay: Duration::from_millis(10),
            timeout: Duration::from_secs(5),
            status_policy: StatusPolicy::default(),
            render: RenderOptions::for_media(media),
            encoder: RasterEncoder::new(),
        }
    }

    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    /// Override the vendor and product ID derived from the model.
    pub fn ids(self, vendor_id: u16, product_id: u16) -> Self {
        UsbConfig {
            vendor_id,
            product_id,
            ..self
        }
    }

    /// Only use the printer reporting this serial number.
    pub fn serial(self, serial: Option<String>) -> Self {
        UsbConfig { serial, ..self }
    }

    /// Split writes at the endpoint's max packet size.
    pub fn chunked(self, flag: bool) -> Self {
        UsbConfig {
            chunked: flag,
            ..self
        }
    }

    pub fn chunk_delay(self, chunk_delay: Duration) -> Self {
        UsbConfig {
            chunk_delay,
            ..self
        }
    }

    /// Timeout of each bulk and control transfer.
    pub fn timeout(self, timeout: Duration) -> Self {
        UsbConfig { timeout, ..self }
    }

    pub fn status_policy(self, status_policy: StatusPolicy) -> Self {
        UsbConfig {
            status_policy,
            ..self
        }
    }

    pub fn render_options(self, render: RenderOptions) -> Self {
        UsbConfig { render, ..self }
    }

    pub fn encoder(self, encoder: RasterEncoder) -> Self {
        UsbConfig { encoder, ..self }
    }
}

/// What a print job needs from an opened printer.
trait Channel {
    fn port_status(&mut self) -> Result<PortStatus, Error>;

    fn write_chunk(&mut self, buf: &[u8]) -> Result<usize, Error>;

    fn max_packet_size(&self) -> usize;
}

/// Applies the status policy, then writes `data` in one or more bulk transfers.
///
/// A failed or short transfer ends the job; bytes already written are not
/// taken back.
fn transmit<C: Channel>(channel: &mut C, data: &[u8], config: &UsbConfig) -> Result<(), Error> {
    match config.status_policy {
        StatusPolicy::Skip => {}
        StatusPolicy::Abort => {
            let status = channel.port_status()?;
            debug!("Port status: {}", status);
            if !status.is_ready() {
                return Err(Error::NotReady(status));
            }
        }
        StatusPolicy::Warn => {
            let status = channel.port_status()?;
            if status.is_ready() {
                debug!("Port status: {}", status);
            } else {
                warn!("Printer is not ready, sending anyway: {}", status);
            }
        }
    }

    let chunk_size = if config.chunked {
        channel.max_packet_size().max(1)
    } else {
        data.len().max(1)
    };

    let mut sent = 0;
    for (i, chunk) in data.chunks(chunk_size).enumerate() {
        if i > 0 && !config.chunk_delay.is_zero() {
            thread::sleep(config.chunk_delay);
        }
        let n = channel.write_chunk(chunk)?;
        sent += n;
        if n != chunk.len() {
            debug!(
                "write error: bytes wrote {} != bytes supplied {}, possibly timeout ?",
                n,
                chunk.len()
            );
            return Err(Error::ShortWrite {
                written: sent,
                expected: data.len(),
            });
        }
    }
    debug!("Wrote {} bytes in chunks of {}", sent, chunk_size);
    Ok(())
}

/// Single-writer guard of one printer.
///
/// A job opens its channel, uses it and drops it while holding the lock, so
/// jobs never interleave and the device is released before the next one
/// starts.
struct DeviceGuard {
    lock: Mutex<()>,
}

impl DeviceGuard {
    fn new() -> Self {
        DeviceGuard {
            lock: Mutex::new(()),
        }
    }

    fn run<C, T, O, J>(&self, open: O, job: J) -> Result<T, Error>
    where
        C: Channel,
        O: FnOnce() -> Result<C, Error>,
        J: FnOnce(&mut C) -> Result<T, Error>,
    {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut channel = open()?;
        job(&mut channel)
    }
}

/// An opened and claimed printer.
///
/// Dropping the session releases the interface and gives a detached kernel
/// driver back, whichever way the job ended.
struct Session {
    handle: DeviceHandle<Context>,
    endpoint: Endpoint,
    timeout: Duration,
    detached: bool,
    claimed: bool,
}

impl Channel for Session {
    fn port_status(&mut self) -> Result<PortStatus, Error> {
        let mut buf = [0u8; 1];
        let n = self.handle.read_control(
            port_status_request_type(),
            GET_PORT_STATUS,
            0,
            self.endpoint.iface as u16,
            &mut buf,
            self.timeout,
        )?;
        if n != 1 {
            return Err(Error::UsbError(rusb::Error::Io));
        }
        Ok(PortStatus::from_byte(buf[0]))
    }

    fn write_chunk(&mut self, buf: &[u8]) -> Result<usize, Error> {
        Ok(self
            .handle
            .write_bulk(self.endpoint.address, buf, self.timeout)?)
    }

    fn max_packet_size(&self) -> usize {
        self.endpoint.max_packet_size as usize
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let iface = self.endpoint.iface;
        if self.claimed {
            if let Err(err) = self.handle.release_interface(iface) {
                debug!("Failed to release interface {}: {:?}", iface, err);
            }
        }
        if self.detached {
            if let Err(err) = self.handle.attach_kernel_driver(iface) {
                debug!("Failed to reattach kernel driver: {:?}", err);
            }
        }
    }
}

/// A Brother QL printer attached over USB.
///
/// The device is opened for each job and released afterwards. Jobs on one
/// `UsbPrinter` never overlap.
pub struct UsbPrinter {
    context: Context,
    config: UsbConfig,
    guard: DeviceGuard,
}

impl UsbPrinter {
    pub fn new(config: UsbConfig) -> Result<Self, Error> {
        let context = Context::new()?;
        Ok(UsbPrinter {
            context,
            config,
            guard: DeviceGuard::new(),
        })
    }

    fn open_device(&self) -> Result<(Device<Context>, DeviceDescriptor, DeviceHandle<Context>), Error> {
        let vid = self.config.vendor_id;
        let pid = self.config.product_id;
        let devices = self.context.devices()?;
        let mut open_error = None;

        for device in devices.iter() {
            let device_desc = match device.device_descriptor() {
                Ok(d) => d,
                Err(err) => {
                    debug!("{:?}", err);
                    continue;
                }
            };

            if device_desc.vendor_id() != vid || device_desc.product_id() != pid {
                continue;
            }
            debug!("{:?}", device_desc);

            let handle = match device.open() {
                Ok(handle) => handle,
                Err(err) => {
                    debug!("Failed to open device: {:?}", err);
                    open_error = Some(err);
                    continue;
                }
            };

            match &self.config.serial {
                None => return Ok((device, device_desc, handle)),
                Some(serial) => match self.read_serial(&handle, &device_desc) {
                    Ok(s) if &s == serial => return Ok((device, device_desc, handle)),
                    Ok(s) => debug!("Skipping printer with serial {:?}", s),
                    Err(err) => debug!("Failed to read serial number string: {:?}", err),
                },
            }
        }

        match open_error {
            // A matching printer exists but could not be opened, usually permissions.
            Some(err) => Err(Error::UsbError(err)),
            None => {
                debug!("No device match with {:04x}:{:04x}", vid, pid);
                Err(Error::DeviceNotFound {
                    vendor_id: vid,
                    product_id: pid,
                })
            }
        }
    }

    fn read_serial(
        &self,
        handle: &DeviceHandle<Context>,
        device_desc: &DeviceDescriptor,
    ) -> Result<String, Error> {
        let timeout = Duration::from_secs(1);
        let languages = handle.read_languages(timeout)?;
        match languages.first() {
            Some(language) => Ok(handle.read_serial_number_string(*language, device_desc, timeout)?),
            None => Err(Error::UsbError(rusb::Error::NotFound)),
        }
    }

    fn find_endpoint(
        device: &Device<Context>,
        device_desc: &DeviceDescriptor,
        direction: Direction,
        transfer_type: TransferType,
    ) -> Option<Endpoint> {
        for n in 0..device_desc.num_configurations() {
            let config_desc = match device.config_descriptor(n) {
                Ok(c) => c,
                Err(_) => continue,
            };
            for interface in config_desc.interfaces() {
                for interface_desc in interface.descriptors() {
                    for endpoint_desc in interface_desc.endpoint_descriptors() {
                        if endpoint_desc.direction() == direction
                            && endpoint_desc.transfer_type() == transfer_type
                        {
                            return Some(Endpoint {
                                config: config_desc.number(),
                                iface: interface_desc.interface_number(),
                                setting: interface_desc.setting_number(),
                                address: endpoint_desc.address(),
                                max_packet_size: endpoint_desc.max_packet_size(),
                            });
                        }
                    }
                }
            }
        }
        None
    }

    /// Opens the printer and claims the interface holding its bulk OUT endpoint.
    fn open(&self) -> Result<Session, Error> {
        let (device, device_desc, handle) = self.open_device()?;

        let endpoint = Self::find_endpoint(&device, &device_desc, Direction::Out, TransferType::Bulk)
            .ok_or(Error::MissingEndpoint)?;
        debug!("{:?}", endpoint);

        let mut session = Session {
            handle,
            endpoint,
            timeout: self.config.timeout,
            detached: false,
            claimed: false,
        };

        // QL-800 reports an active usblp driver which must be detached,
        // QL-820NWB does not.
        if let Ok(true) = session.handle.kernel_driver_active(endpoint.iface) {
            session.handle.detach_kernel_driver(endpoint.iface)?;
            session.detached = true;
        }
        info!("Kernel driver detached: {}", session.detached);

        if session.handle.active_configuration()? != endpoint.config {
            session.handle.set_active_configuration(endpoint.config)?;
        }
        session.handle.claim_interface(endpoint.iface)?;
        session.claimed = true;
        session
            .handle
            .set_alternate_setting(endpoint.iface, endpoint.setting)?;

        Ok(session)
    }

    /// Sends a complete command stream as one job.
    pub fn send(&self, data: &[u8]) -> Result<(), Error> {
        info!("Sending {} bytes to printer", data.len());
        self.guard.run(
            || self.open(),
            |session: &mut Session| transmit(session, data, &self.config),
        )
    }

    /// Encodes and prints one label bitmap.
    pub fn print_bitmap(&self, bitmap: &Bitmap) -> Result<(), Error> {
        let data = self.config.encoder.encode(bitmap);
        self.send(&data)
    }

    /// Read printer port status.
    ///
    /// This method is convenient for inspection when a new media is added.
    pub fn check_status(&self) -> Result<PortStatus, Error> {
        self.guard
            .run(|| self.open(), |session: &mut Session| session.port_status())
    }
}

impl PrintBackend for UsbPrinter {
    fn print_text(&self, text: &str) -> Result<(), Error> {
        let bitmap = render_text(text, &self.config.render)?;
        self.print_bitmap(&bitmap)
    }

    fn describe(&self) -> String {
        let model = Model::from_pid(self.config.product_id)
            .map(|model| model.name().to_string())
            .unwrap_or_else(|| "printer".to_string());
        format!(
            "USB {} ({:04x}:{:04x})",
            model, self.config.vendor_id, self.config.product_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    struct FakeChannel {
        status: u8,
        packet: usize,
        accept: Option<usize>,
        writes: Vec<Vec<u8>>,
        status_reads: usize,
    }

    impl FakeChannel {
        fn ready() -> Self {
            FakeChannel {
                status: 0x18,
                packet: 4,
                accept: None,
                writes: Vec::new(),
                status_reads: 0,
            }
        }
    }

    impl Channel for FakeChannel {
        fn port_status(&mut self) -> Result<PortStatus, Error> {
            self.status_reads += 1;
            Ok(PortStatus::from_byte(self.status))
        }

        fn write_chunk(&mut self, buf: &[u8]) -> Result<usize, Error> {
            self.writes.push(buf.to_vec());
            Ok(self.accept.unwrap_or(buf.len()).min(buf.len()))
        }

        fn max_packet_size(&self) -> usize {
            self.packet
        }
    }

    fn config() -> UsbConfig {
        UsbConfig::new(Model::QL810W, Media::Continuous62).chunk_delay(Duration::ZERO)
    }

    #[test]
    fn default_config_targets_ql810w() {
        let config = UsbConfig::new(Model::default(), Media::default());
        assert_eq!(config.vendor_id(), 0x04F9);
        assert_eq!(config.product_id(), 0x209C);
        assert_eq!(config.status_policy, StatusPolicy::Abort);
        assert_eq!(config.render.width, 696);
        assert!(!config.chunked);
    }

    #[test]
    fn whole_stream_in_one_transfer() {
        let mut channel = FakeChannel::ready();
        transmit(&mut channel, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10], &config()).unwrap();
        assert_eq!(channel.writes, vec![vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10]]);
        assert_eq!(channel.status_reads, 1);
    }

    #[test]
    fn chunked_at_max_packet_size() {
        let mut channel = FakeChannel::ready();
        transmit(&mut channel, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10], &config().chunked(true)).unwrap();
        assert_eq!(
            channel.writes,
            vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8], vec![9, 10]]
        );
    }

    #[test]
    fn abort_policy_sends_nothing_when_not_ready() {
        let mut channel = FakeChannel::ready();
        channel.status = 0x38;
        let err = transmit(&mut channel, &[1, 2, 3], &config()).unwrap_err();
        assert!(matches!(err, Error::NotReady(status) if status.contains(PortStatus::PAPER_EMPTY)));
        assert!(channel.writes.is_empty());
    }

    #[test]
    fn warn_policy_sends_anyway() {
        let mut channel = FakeChannel::ready();
        channel.status = 0x00;
        transmit(&mut channel, &[1, 2, 3], &config().status_policy(StatusPolicy::Warn)).unwrap();
        assert_eq!(channel.writes.len(), 1);
    }

    #[test]
    fn skip_policy_does_not_query() {
        let mut channel = FakeChannel::ready();
        channel.status = 0x00;
        transmit(&mut channel, &[1, 2, 3], &config().status_policy(StatusPolicy::Skip)).unwrap();
        assert_eq!(channel.status_reads, 0);
        assert_eq!(channel.writes.len(), 1);
    }

    #[test]
    fn short_write_fails_the_whole_job() {
        let mut channel = FakeChannel::ready();
        channel.accept = Some(3);
        let err = transmit(&mut channel, &[0; 10], &config().chunked(true)).unwrap_err();
        assert!(matches!(
            err,
            Error::ShortWrite {
                written: 3,
                expected: 10
            }
        ));
        assert_eq!(channel.writes.len(), 1);
    }

    /// Channel writing into a log shared by several jobs.
    struct SharedChannel {
        job: u8,
        status: u8,
        log: Arc<Mutex<Vec<u8>>>,
        drops: Arc<AtomicUsize>,
    }

    impl Channel for SharedChannel {
        fn port_status(&mut self) -> Result<PortStatus, Error> {
            Ok(PortStatus::from_byte(self.status))
        }

        fn write_chunk(&mut self, buf: &[u8]) -> Result<usize, Error> {
            self.log.lock().unwrap().push(self.job);
            thread::sleep(Duration::from_millis(1));
            Ok(buf.len())
        }

        fn max_packet_size(&self) -> usize {
            2
        }
    }

    impl Drop for SharedChannel {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn concurrent_jobs_do_not_interleave() {
        let guard = Arc::new(DeviceGuard::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let drops = Arc::new(AtomicUsize::new(0));
        let config = Arc::new(config().chunked(true).chunk_delay(Duration::from_millis(1)));

        let handles: Vec<_> = (1..=2u8)
            .map(|job| {
                let (guard, log, drops, config) =
                    (guard.clone(), log.clone(), drops.clone(), config.clone());
                thread::spawn(move || {
                    guard.run(
                        || {
                            Ok(SharedChannel {
                                job,
                                status: 0x18,
                                log,
                                drops,
                            })
                        },
                        |channel| transmit(channel, &[0; 20], &config),
                    )
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 20);
        let first = log[0];
        assert!(log[..10].iter().all(|job| *job == first), "{:?}", log);
        assert!(log[10..].iter().all(|job| *job != first), "{:?}", log);
        assert_eq!(drops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_job_releases_channel_and_lock() {
        let guard = DeviceGuard::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let drops = Arc::new(AtomicUsize::new(0));
        let open = |status| {
            let (log, drops) = (log.clone(), drops.clone());
            move || {
                Ok(SharedChannel {
                    job: 1,
                    status,
                    log,
                    drops,
                })
            }
        };

        let err = guard
            .run(open(0x28), |channel| transmit(channel, &[0; 4], &config()))
            .unwrap_err();
        assert!(matches!(err, Error::NotReady(_)));
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(log.lock().unwrap().is_empty());

        guard
            .run(open(0x18), |channel| transmit(channel, &[0; 4], &config()))
            .unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 2);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn failed_open_runs_no_job() {
        let guard = DeviceGuard::new();
        let result: Result<(), Error> = guard.run(
            || -> Result<SharedChannel, Error> { Err(Error::MissingEndpoint) },
            |_| panic!("job must not run"),
        );
        assert!(matches!(result, Err(Error::MissingEndpoint)));
    }
}
