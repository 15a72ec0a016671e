//! Glues the stages together for one job:
//!
//! ```text
//! ValueSource -> encoder -> TransmissionJob (chunk planner, pacer) -> MidiSink
//! ```
//!
//! All input validation happens before the endpoint is opened, so a bad file
//! never touches the device.

use crate::{
    chunk_planner::{self, SysexFrame},
    config::{Backend, TransferSettings},
    encoder::{self, PayloadBuffer},
    error::{InputError, PortUnavailable, SysexError},
    interrupt::CancelToken,
    pacing::Pacer,
    transmission::{Strategy, TransmissionJob, TransmissionReport},
    transport::{
        Endpoint, EndpointSelector, MidiTransport, SerialTransport, SinkGuard, SyxFileTransport,
        Transport,
    },
    value_source::ValueSource,
};

use log::{info, warn};

/// Builds the transport for a backend. Nothing is opened yet.
pub fn transport_for(backend: &Backend) -> Box<dyn Transport> {
    match backend {
        Backend::Midi => Box::new(MidiTransport::default()),
        Backend::Serial { baud } => Box::new(SerialTransport::new(*baud)),
        Backend::SyxFile { path } => Box::new(SyxFileTransport::new(path)),
    }
}

/// Loads and encodes a source. An empty result is an
/// [`InputError::EmptyPayload`].
pub fn prepare(source: &ValueSource) -> Result<PayloadBuffer, InputError> {
    let values = source.load()?;
    if values.is_empty() {
        return Err(InputError::EmptyPayload);
    }

    let payload = encoder::encode_all(&values);
    info!(
        "Encoded {} values into {} SysEx bytes ({} bytes per value)",
        values.len(),
        payload.len(),
        encoder::QUINTET_LEN
    );
    Ok(payload)
}

/// Runs one complete job: prepare the payload, open the endpoint, deliver,
/// settle, close. The endpoint is closed on every exit path.
pub fn run(
    source: &ValueSource,
    settings: &TransferSettings,
    transport: &mut dyn Transport,
    cancel: CancelToken,
) -> Result<TransmissionReport, SysexError> {
    let payload = prepare(source)?;
    run_prepared(payload, settings, transport, cancel)
}

/// Like [`run`], but `choose` picks the endpoint from the live listing.
/// The source is loaded and checked before the transport is touched, so a
/// bad file is reported without listing ports or asking the user. `choose`
/// returning `None` cancels the job.
pub fn run_interactive<F>(
    source: &ValueSource,
    settings: &TransferSettings,
    transport: &mut dyn Transport,
    cancel: CancelToken,
    choose: F,
) -> Result<TransmissionReport, SysexError>
where
    F: FnOnce(Vec<Endpoint>, &'static str) -> Result<Option<Endpoint>, SysexError>,
{
    let payload = prepare(source)?;

    let endpoints = transport.list_endpoints()?;
    if endpoints.is_empty() {
        return Err(PortUnavailable::NoEndpoints.into());
    }
    let endpoint = choose(endpoints, transport.backend_name())?.ok_or(SysexError::Cancelled)?;
    info!("Selected {}", endpoint);

    let settings = TransferSettings {
        endpoint: EndpointSelector::Index(endpoint.index),
        ..settings.clone()
    };
    run_prepared(payload, &settings, transport, cancel)
}

/// Delivers an already encoded, non-empty payload: open the endpoint,
/// transmit, settle, close.
pub fn run_prepared(
    payload: PayloadBuffer,
    settings: &TransferSettings,
    transport: &mut dyn Transport,
    cancel: CancelToken,
) -> Result<TransmissionReport, SysexError> {
    let pacer = Pacer::new(settings.pacing, cancel);
    pacer.check()?;

    let mut sink = SinkGuard::open(transport, &settings.endpoint)?;
    let mut job = TransmissionJob::new(
        payload,
        settings.manufacturer_id,
        settings.mode,
        settings.chunk_policy,
    );

    let report = job.run(&mut *sink, &pacer)?;

    // Let the driver drain before the port goes away.
    if pacer.pause(settings.settle).is_err() {
        warn!("Settle pause interrupted, closing now");
    }
    Ok(report)
}

/// A dry look at what a job would send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    /// Values read from the source
    pub values: usize,
    /// Encoded payload size
    pub payload_len: usize,
    /// Frames the chunked strategy would cut
    pub chunked_frames: usize,
    /// Payload bytes per chunked frame
    pub chunk_size: usize,
    /// Leading bytes of the first message that would be sent
    pub head: Vec<u8>,
    /// Whether decoding the payload gives back the source values
    pub round_trips: bool,
}

/// Loads, encodes and decodes a source without touching any transport.
pub fn inspect(
    source: &ValueSource,
    settings: &TransferSettings,
) -> Result<Inspection, SysexError> {
    let values = source.load()?;
    if values.is_empty() {
        return Err(InputError::EmptyPayload.into());
    }
    let payload = encoder::encode_all(&values);
    let chunk_size = settings.chunk_policy.chunk_size(payload.len());

    let first = match settings.mode.strategies().first() {
        Some(Strategy::Chunked) => {
            chunk_planner::plan(&payload, settings.manufacturer_id, chunk_size)
                .into_iter()
                .next()
        }
        _ => Some(SysexFrame::new(settings.manufacturer_id, &payload)),
    };
    let head = first
        .map(|f| f.as_bytes().iter().take(16).copied().collect())
        .unwrap_or_default();

    Ok(Inspection {
        values: values.len(),
        payload_len: payload.len(),
        chunked_frames: chunk_planner::frame_count(payload.len(), chunk_size),
        chunk_size,
        head,
        round_trips: encoder::decode_payload(&payload) == values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::TransferConfig,
        transmission::TransferMode,
        transport::{mock::MockTransport, SyxFileTransport},
    };
    use hound::{SampleFormat, WavSpec, WavWriter};
    use std::{io::Write, path::Path, time::Duration};

    fn quick(config: TransferConfig, source: &ValueSource) -> TransferSettings {
        let mut settings = config.settings_for(source);
        settings.pacing.chunk_delay = Duration::ZERO;
        settings.pacing.byte_delay = Duration::ZERO;
        settings.settle = Duration::ZERO;
        settings
    }

    fn hex_file(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", text).unwrap();
        file
    }

    fn wav_file(path: &Path, channels: u16, samples: &[i32]) {
        let spec = WavSpec {
            channels,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn hex_file_end_to_end() {
        let file = hex_file("{ 0x00003FFF, 0x001127BA }");
        let source = ValueSource::HexText(file.path().to_path_buf());
        let settings = quick(TransferConfig::default(), &source);
        let mut transport = MockTransport::accepting();
        let log = transport.log.clone();

        let report = run(&source, &settings, &mut transport, CancelToken::new()).unwrap();

        assert_eq!(report.strategy, Strategy::Monolithic);
        let log = log.lock().unwrap();
        assert_eq!(
            log.wire(),
            vec![0xF0, 0x7D, 0x7F, 0x7F, 0x00, 0x00, 0x00, 0x3A, 0x4F, 0x44, 0x00, 0x00, 0xF7]
        );
        assert_eq!((log.opens, log.closes), (1, 1));
    }

    #[test]
    fn stereo_wav_never_opens_the_port() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        wav_file(&path, 2, &[1, 2, 3, 4]);
        let source = ValueSource::Wav(path);
        let settings = quick(TransferConfig::default(), &source);
        let mut transport = MockTransport::accepting();
        let log = transport.log.clone();

        let result = run(&source, &settings, &mut transport, CancelToken::new());

        assert!(matches!(
            result,
            Err(SysexError::Input(InputError::WavChannels { channels: 2 }))
        ));
        assert_eq!(log.lock().unwrap().opens, 0);
    }

    #[test]
    fn bad_source_is_reported_before_listing_ports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        wav_file(&path, 2, &[1, 2, 3, 4]);
        let missing = dir.path().join("missing.txt");
        let no_literals = hex_file("nothing here");

        for source in [
            ValueSource::Wav(path),
            ValueSource::HexText(missing),
            ValueSource::HexText(no_literals.path().to_path_buf()),
        ] {
            let settings = quick(TransferConfig::default(), &source);
            let mut transport = MockTransport::accepting();
            let log = transport.log.clone();
            let mut asked = false;

            let result = run_interactive(
                &source,
                &settings,
                &mut transport,
                CancelToken::new(),
                |endpoints, _| {
                    asked = true;
                    Ok(endpoints.into_iter().next())
                },
            );

            assert!(matches!(result, Err(SysexError::Input(_))));
            assert!(!asked);
            let log = log.lock().unwrap();
            assert_eq!((log.lists, log.opens), (0, 0));
        }
    }

    #[test]
    fn chosen_endpoint_is_the_one_opened() {
        let file = hex_file("0x1234");
        let source = ValueSource::HexText(file.path().to_path_buf());
        let settings = quick(TransferConfig::default(), &source);
        let mut transport = MockTransport::accepting();
        transport.endpoints = vec!["Midi Through".to_owned(), "Freetribe".to_owned()];
        let log = transport.log.clone();

        let report = run_interactive(
            &source,
            &settings,
            &mut transport,
            CancelToken::new(),
            |endpoints, backend| {
                assert_eq!(backend, "mock");
                Ok(endpoints.into_iter().find(|e| e.name == "Freetribe"))
            },
        )
        .unwrap();

        assert_eq!(report.strategy, Strategy::Monolithic);
        let log = log.lock().unwrap();
        assert_eq!((log.lists, log.opens, log.closes), (2, 1, 1));
    }

    #[test]
    fn declining_the_choice_cancels() {
        let file = hex_file("0x1234");
        let source = ValueSource::HexText(file.path().to_path_buf());
        let settings = quick(TransferConfig::default(), &source);
        let mut transport = MockTransport::accepting();
        let log = transport.log.clone();

        let result = run_interactive(
            &source,
            &settings,
            &mut transport,
            CancelToken::new(),
            |_, _| Ok(None),
        );

        assert!(matches!(result, Err(SysexError::Cancelled)));
        assert_eq!(log.lock().unwrap().opens, 0);
    }

    #[test]
    fn empty_wav_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        wav_file(&path, 1, &[]);
        let source = ValueSource::Wav(path);
        let settings = quick(TransferConfig::default(), &source);
        let mut transport = MockTransport::accepting();
        let log = transport.log.clone();

        let result = run(&source, &settings, &mut transport, CancelToken::new());

        assert!(matches!(
            result,
            Err(SysexError::Input(InputError::EmptyPayload))
        ));
        assert_eq!(log.lock().unwrap().opens, 0);
    }

    #[test]
    fn wav_streams_in_sample_sized_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        let samples: Vec<i32> = (0..300).map(|i| i * -7919).collect();
        wav_file(&path, 1, &samples);
        let source = ValueSource::Wav(path);
        let settings = quick(TransferConfig::default(), &source);
        let mut transport = MockTransport::accepting();
        let log = transport.log.clone();

        let report = run(&source, &settings, &mut transport, CancelToken::new()).unwrap();

        assert_eq!(report.strategy, Strategy::Chunked);
        assert_eq!(report.frames_sent, 3);
        let log = log.lock().unwrap();
        let sizes: Vec<usize> = log.accepted.iter().map(|f| f.len() - 3).collect();
        assert_eq!(sizes, vec![640, 640, 220]);

        let payload: Vec<u8> = log
            .accepted
            .iter()
            .flat_map(|f| f[2..f.len() - 1].to_vec())
            .collect();
        let decoded: Vec<i32> = encoder::decode_payload(&payload)
            .into_iter()
            .map(|v| v as i32)
            .collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn no_endpoints_is_port_unavailable() {
        let file = hex_file("0x01");
        let source = ValueSource::HexText(file.path().to_path_buf());
        let settings = quick(TransferConfig::default(), &source);
        let mut transport = MockTransport::accepting();
        transport.endpoints.clear();

        assert!(matches!(
            run(&source, &settings, &mut transport, CancelToken::new()),
            Err(SysexError::PortUnavailable(PortUnavailable::NoEndpoints))
        ));
    }

    #[test]
    fn cancelled_before_start_never_opens() {
        let file = hex_file("0x01");
        let source = ValueSource::HexText(file.path().to_path_buf());
        let settings = quick(TransferConfig::default(), &source);
        let mut transport = MockTransport::accepting();
        let log = transport.log.clone();
        let cancel = CancelToken::new();
        cancel.cancel();

        assert!(matches!(
            run(&source, &settings, &mut transport, cancel),
            Err(SysexError::Cancelled)
        ));
        assert_eq!(log.lock().unwrap().opens, 0);
    }

    #[test]
    fn exports_to_syx_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.syx");
        let file = hex_file("0x1 0x2 0x3");
        let source = ValueSource::HexText(file.path().to_path_buf());
        let config = TransferConfig {
            mode: TransferMode::Chunked,
            chunk_size: Some(32),
            ..Default::default()
        };
        let settings = quick(config, &source);
        let mut transport = SyxFileTransport::new(&out);

        run(&source, &settings, &mut transport, CancelToken::new()).unwrap();

        let written = std::fs::read(&out).unwrap();
        assert_eq!(written.first(), Some(&0xF0));
        assert_eq!(written.last(), Some(&0xF7));
        assert_eq!(encoder::decode_payload(&written[2..written.len() - 1]), vec![1, 2, 3]);
    }

    #[test]
    fn backend_picks_transport() {
        assert_eq!(transport_for(&Backend::Midi).backend_name(), "midi");
        assert_eq!(transport_for(&Backend::serial()).backend_name(), "serial");
        let file = transport_for(&Backend::SyxFile {
            path: "x.syx".into(),
        });
        assert_eq!(file.backend_name(), "syx-file");
        assert_eq!(file.list_endpoints().unwrap()[0].name, "x.syx");
    }

    #[test]
    fn inspect_reports_without_sending() {
        let values: String = (0..200).map(|i| format!("0x{:08X}, ", i * 31)).collect();
        let file = hex_file(&values);
        let source = ValueSource::HexText(file.path().to_path_buf());
        let config = TransferConfig {
            mode: TransferMode::Chunked,
            chunk_size: Some(300),
            ..Default::default()
        };
        let settings = config.settings_for(&source);

        let inspection = inspect(&source, &settings).unwrap();

        assert_eq!(inspection.values, 200);
        assert_eq!(inspection.payload_len, 1000);
        assert_eq!(inspection.chunk_size, 300);
        assert_eq!(inspection.chunked_frames, 4);
        assert_eq!(&inspection.head[..2], &[0xF0, 0x7D]);
        assert!(inspection.round_trips);
    }
}
