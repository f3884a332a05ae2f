//! FSR channel table and raw-value conversion.

use std::fmt;

use crate::config::LoggerConfig;
use crate::hardware::{AnalogReader, PinId};

/// Linear map between two integer ranges, truncating toward zero.
///
/// `apply(x) = (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeMap {
    in_min: i64,
    in_max: i64,
    out_min: i64,
    out_max: i64,
}

impl RangeMap {
    /// Map `[in_min, in_max]` onto `[out_min, out_max]`.
    ///
    /// `in_min` and `in_max` must differ.
    pub const fn new(in_min: i64, in_max: i64, out_min: i64, out_max: i64) -> Self {
        Self {
            in_min,
            in_max,
            out_min,
            out_max,
        }
    }

    /// ADC codes `0..=adc_max` onto `0..=output_max` millivolts.
    pub const fn adc_to_millivolts(adc_max: u16, output_max: i32) -> Self {
        Self::new(0, adc_max as i64, 0, output_max as i64)
    }

    /// Map one value. Inputs outside the source range extrapolate.
    pub fn apply(&self, value: i64) -> i64 {
        (value - self.in_min) * (self.out_max - self.out_min) / (self.in_max - self.in_min)
            + self.out_min
    }
}

/// Slope/intercept pair turning millivolts into force units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Force units per millivolt
    pub slope: f64,
    /// Force at zero millivolts
    pub intercept: f64,
}

impl Calibration {
    /// Convert a scaled reading to force units.
    pub fn apply(&self, millivolts: i32) -> f64 {
        self.slope * f64::from(millivolts) + self.intercept
    }
}

/// One FSR input. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    index: usize,
    name: String,
    pin: PinId,
    calibration: Calibration,
}

impl Channel {
    /// Position in the channel table.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw input selector.
    pub fn pin(&self) -> PinId {
        self.pin
    }
}

/// What gets written for each channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Range-mapped millivolt-like value (reference behaviour)
    Scaled,
    /// Calibrated force value
    Calibrated,
}

/// A single channel reading as it appears in a record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelValue {
    /// Range-mapped integer value
    Scaled(i32),
    /// Calibrated force
    Force(f64),
}

impl fmt::Display for ChannelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelValue::Scaled(v) => write!(f, "{v}"),
            ChannelValue::Force(v) => write!(f, "{v:.3}"),
        }
    }
}

impl From<i32> for ChannelValue {
    fn from(value: i32) -> Self {
        ChannelValue::Scaled(value)
    }
}

/// The ordered FSR channel set with the shared range map.
///
/// Channel order is the configuration order and never changes during a run.
#[derive(Debug, Clone)]
pub struct ChannelArray {
    channels: Vec<Channel>,
    range: RangeMap,
    mode: OutputMode,
}

impl ChannelArray {
    /// Build from explicit parts.
    pub fn new(
        definitions: impl IntoIterator<Item = (String, PinId, Calibration)>,
        range: RangeMap,
        mode: OutputMode,
    ) -> Self {
        let channels = definitions
            .into_iter()
            .enumerate()
            .map(|(index, (name, pin, calibration))| Channel {
                index,
                name,
                pin,
                calibration,
            })
            .collect();
        Self {
            channels,
            range,
            mode,
        }
    }

    /// Build from the channel table and acquisition settings.
    pub fn from_config(config: &LoggerConfig) -> Self {
        let acq = &config.acquisition;
        let mode = if acq.apply_calibration {
            OutputMode::Calibrated
        } else {
            OutputMode::Scaled
        };
        Self::new(
            config.channels.iter().map(|c| {
                (
                    c.name.clone(),
                    c.pin,
                    Calibration {
                        slope: c.slope,
                        intercept: c.intercept,
                    },
                )
            }),
            RangeMap::adc_to_millivolts(acq.adc_max, acq.output_max_mv),
            mode,
        )
    }

    /// Number of channels (N).
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channels in sampling order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Column names in sampling order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(Channel::name)
    }

    /// Selected output mode.
    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Range-map a raw code into the output domain, saturating at the `i32` bounds.
    pub fn scale(&self, raw: u16) -> i32 {
        let mapped = self.range.apply(i64::from(raw));
        i32::try_from(mapped).unwrap_or(if mapped < 0 { i32::MIN } else { i32::MAX })
    }

    /// Convert one raw code for `channel` according to the output mode.
    pub fn convert(&self, channel: &Channel, raw: u16) -> ChannelValue {
        let scaled = self.scale(raw);
        match self.mode {
            OutputMode::Scaled => ChannelValue::Scaled(scaled),
            OutputMode::Calibrated => ChannelValue::Force(channel.calibration.apply(scaled)),
        }
    }

    /// Read and convert every channel, in order. Always yields exactly `len()` values.
    pub async fn read_all<R>(&self, reader: &R) -> anyhow::Result<Vec<ChannelValue>>
    where
        R: AnalogReader + ?Sized,
    {
        let mut values = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let raw = reader.read_raw(channel.pin).await?;
            values.push(self.convert(channel, raw));
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::MockAnalogInput;

    fn array(mode: OutputMode) -> ChannelArray {
        ChannelArray::new(
            vec![
                (
                    "heel".to_string(),
                    4,
                    Calibration {
                        slope: 0.5,
                        intercept: 10.0,
                    },
                ),
                (
                    "toe".to_string(),
                    2,
                    Calibration {
                        slope: 2.0,
                        intercept: 0.0,
                    },
                ),
            ],
            RangeMap::adc_to_millivolts(1023, 5000),
            mode,
        )
    }

    #[test]
    fn range_map_endpoints() {
        let map = RangeMap::adc_to_millivolts(1023, 5000);
        assert_eq!(map.apply(0), 0);
        assert_eq!(map.apply(1023), 5000);
    }

    #[test]
    fn range_map_truncates() {
        let map = RangeMap::adc_to_millivolts(1023, 5000);
        // 512 * 5000 / 1023 = 2502.44
        assert_eq!(map.apply(512), 2502);
        // 1 * 5000 / 1023 = 4.89
        assert_eq!(map.apply(1), 4);
    }

    #[test]
    fn range_map_with_offsets() {
        let map = RangeMap::new(100, 200, -50, 50);
        assert_eq!(map.apply(100), -50);
        assert_eq!(map.apply(150), 0);
        assert_eq!(map.apply(200), 50);
    }

    #[test]
    fn channels_keep_configuration_order() {
        let channels = array(OutputMode::Scaled);
        assert_eq!(channels.len(), 2);
        assert_eq!(channels.names().collect::<Vec<_>>(), vec!["heel", "toe"]);
        assert_eq!(channels.channels()[1].index(), 1);
        assert_eq!(channels.channels()[1].pin(), 2);
    }

    #[test]
    fn from_reference_config() {
        let channels = ChannelArray::from_config(&LoggerConfig::default());
        assert_eq!(channels.len(), 10);
        assert_eq!(channels.mode(), OutputMode::Scaled);
        assert_eq!(channels.scale(1023), 5000);
    }

    #[test]
    fn calibration_flag_selects_calibrated_output() {
        let mut config = LoggerConfig::default();
        config.acquisition.apply_calibration = true;
        config.channels[0].slope = 0.25;
        config.channels[0].intercept = -1.0;

        let channels = ChannelArray::from_config(&config);
        assert_eq!(channels.mode(), OutputMode::Calibrated);
        let first = &channels.channels()[0];
        assert_eq!(channels.convert(first, 1023), ChannelValue::Force(1249.0));
    }

    #[test]
    fn scale_saturates_instead_of_wrapping() {
        let channels = ChannelArray::new(
            vec![(
                "heel".to_string(),
                0,
                Calibration {
                    slope: 1.0,
                    intercept: 0.0,
                },
            )],
            RangeMap::adc_to_millivolts(1, i32::MAX),
            OutputMode::Scaled,
        );
        assert_eq!(channels.scale(1), i32::MAX);
        // Codes above adc_max extrapolate past i32::MAX
        assert_eq!(channels.scale(u16::MAX), i32::MAX);

        let inverted = ChannelArray::new(
            Vec::new(),
            RangeMap::new(0, 1, 0, i64::from(i32::MIN)),
            OutputMode::Scaled,
        );
        assert_eq!(inverted.scale(3), i32::MIN);
    }

    #[tokio::test]
    async fn read_all_scales_every_channel() {
        let adc = MockAnalogInput::new();
        adc.set_raw(4, 1023);
        adc.set_raw(2, 0);

        let values = array(OutputMode::Scaled).read_all(&adc).await.unwrap();
        assert_eq!(
            values,
            vec![ChannelValue::Scaled(5000), ChannelValue::Scaled(0)]
        );
    }

    #[tokio::test]
    async fn calibrated_mode_applies_coefficients() {
        let adc = MockAnalogInput::new();
        adc.set_raw(4, 1023);
        adc.set_raw(2, 1023);

        let values = array(OutputMode::Calibrated).read_all(&adc).await.unwrap();
        assert_eq!(
            values,
            vec![ChannelValue::Force(2510.0), ChannelValue::Force(10000.0)]
        );
        assert_eq!(values[0].to_string(), "2510.000");
    }

    #[tokio::test]
    async fn read_error_propagates() {
        let adc = MockAnalogInput::new();
        adc.fail_pin(2);
        assert!(array(OutputMode::Scaled).read_all(&adc).await.is_err());
    }
}
