// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Delivery of metric observations.
///
/// [`MetricSink`] receives the complete batch of a run exactly once.
/// [`OtlpExporter`] records every observation on a `u64` or `f64` gauge and
/// pushes the batch to an OTLP/HTTP endpoint; [`StdoutSink`] prints it as JSON for dry
/// runs.
use std::{collections::BTreeMap, io, time::Duration};

use opentelemetry::{
    KeyValue,
    metrics::{Gauge, Meter, MeterProvider as _},
};
use opentelemetry_otlp::{MetricExporter, Protocol, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::{
    Resource,
    metrics::{PeriodicReader, SdkMeterProvider, exporter::PushMetricExporter},
};
use tracing::{debug, info, warn};

use crate::{
    config::{Config, ExportTarget, OtlpProtocol, OtlpSettings},
    error::Error,
    observation::{MetricObservation, MetricValue, describe},
};

/// Instrumentation scope of every exported instrument.
pub const METER_NAME: &str = "github.metrics.meter";
/// Reader interval; long enough that delivery only happens on shutdown.
const READER_INTERVAL: Duration = Duration::from_secs(3600,);

/// Destination for the observations of one run.
#[allow(async_fn_in_trait)]
pub trait MetricSink
{
    /// Delivers the batch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Export`] or [`Error::Serialize`] when delivery fails.
    async fn export(&self, batch: &[MetricObservation],) -> Result<(), Error,>;
}

/// OTLP/HTTP exporter built on the OpenTelemetry SDK.
#[derive(Debug, Clone,)]
pub struct OtlpExporter
{
    settings: OtlpSettings,
}

impl OtlpExporter
{
    /// Creates an exporter for validated settings.
    pub fn new(settings: OtlpSettings,) -> Self
    {
        Self {
            settings,
        }
    }
}

impl MetricSink for OtlpExporter
{
    async fn export(&self, batch: &[MetricObservation],) -> Result<(), Error,>
    {
        if batch.is_empty() {
            warn!("No observations to export");
            return Ok((),);
        }

        info!(
            "Exporting {} observations to {} ({})",
            batch.len(),
            self.settings.endpoint,
            self.settings.protocol
        );

        let settings = self.settings.clone();
        let batch = batch.to_vec();

        // The blocking HTTP client must not run on the async executor.
        tokio::task::spawn_blocking(move || {
            let exporter = otlp_exporter(&settings,)?;
            deliver(exporter, &settings.service_name, &batch,)
        },)
        .await
        .map_err(|e| Error::export(format!("export task failed: {e}"),),)?
    }
}

impl From<OtlpProtocol,> for Protocol
{
    fn from(protocol: OtlpProtocol,) -> Self
    {
        match protocol {
            OtlpProtocol::HttpProtobuf => Protocol::HttpBinary,
            OtlpProtocol::HttpJson => Protocol::HttpJson,
        }
    }
}

fn otlp_exporter(settings: &OtlpSettings,) -> Result<MetricExporter, Error,>
{
    MetricExporter::builder()
        .with_http()
        .with_protocol(settings.protocol.into(),)
        .with_endpoint(settings.endpoint.clone(),)
        .with_headers(settings.headers.clone(),)
        .with_timeout(settings.timeout,)
        .build()
        .map_err(|e| Error::export(format!("failed to build OTLP exporter: {e}"),),)
}

/// Records the batch on a fresh meter provider and pushes it through
/// `exporter` once.
fn deliver<E,>(exporter: E, service_name: &str, batch: &[MetricObservation],) -> Result<(), Error,>
where
    E: PushMetricExporter,
{
    let reader = PeriodicReader::builder(exporter,).with_interval(READER_INTERVAL,).build();
    let provider = SdkMeterProvider::builder()
        .with_resource(Resource::builder().with_service_name(service_name.to_owned(),).build(),)
        .with_reader(reader,)
        .build();

    record(&provider.meter(METER_NAME,), batch,);

    // Shutdown performs the final collection and push; its result carries
    // any export failure.
    provider.shutdown().map_err(|e| Error::export(e.to_string(),),)?;

    debug!("OTLP export completed");
    Ok((),)
}

/// Records every observation on a gauge named after it.
fn record(meter: &Meter, batch: &[MetricObservation],)
{
    let mut counts: BTreeMap<&str, Gauge<u64,>,> = BTreeMap::new();
    let mut measurements: BTreeMap<&str, Gauge<f64,>,> = BTreeMap::new();

    for observation in batch {
        let name = observation.name.as_str();
        let attributes: Vec<KeyValue,> = observation
            .attributes
            .iter()
            .map(|(key, value,)| KeyValue::new(key.clone(), value.clone(),),)
            .collect();

        match observation.value {
            MetricValue::Count(value,) => {
                let gauge = counts.entry(name,).or_insert_with(|| {
                    let builder = meter.u64_gauge(name.to_owned(),);
                    match describe(name,) {
                        Some(description,) => builder.with_description(description,).build(),
                        None => builder.build(),
                    }
                },);
                gauge.record(value, &attributes,);
            }
            MetricValue::Measurement(value,) => {
                let gauge =
                    measurements.entry(name,).or_insert_with(|| meter.f64_gauge(name.to_owned(),).build(),);
                gauge.record(value, &attributes,);
            }
        }
    }
}

/// Writes observations as JSON to standard output.
#[derive(Debug, Clone, Copy, Default,)]
pub struct StdoutSink;

impl MetricSink for StdoutSink
{
    async fn export(&self, batch: &[MetricObservation],) -> Result<(), Error,>
    {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        write_observations(&mut handle, batch,)
    }
}

/// Serializes observations as pretty JSON followed by a newline.
///
/// # Errors
///
/// Returns [`Error::Serialize`] when serialization fails.
pub fn write_observations<W: io::Write,>(writer: &mut W, batch: &[MetricObservation],) -> Result<(), Error,>
{
    serde_json::to_writer_pretty(&mut *writer, batch,)?;
    writeln!(writer).map_err(|e| Error::export(format!("failed to write observations: {e}"),),)?;

    Ok((),)
}

/// Sink selected by the run configuration.
#[derive(Debug, Clone,)]
pub enum Sink
{
    /// Deliver over OTLP.
    Otlp(OtlpExporter,),
    /// Print for inspection.
    Stdout(StdoutSink,),
}

impl Sink
{
    /// Selects the sink matching [`Config::export`].
    pub fn for_config(config: &Config,) -> Self
    {
        match &config.export {
            ExportTarget::Otlp(settings,) => Self::Otlp(OtlpExporter::new(settings.clone(),),),
            ExportTarget::DryRun => Self::Stdout(StdoutSink,),
        }
    }
}

impl MetricSink for Sink
{
    async fn export(&self, batch: &[MetricObservation],) -> Result<(), Error,>
    {
        match self {
            Self::Otlp(exporter,) => exporter.export(batch,).await,
            Self::Stdout(sink,) => sink.export(batch,).await,
        }
    }
}
