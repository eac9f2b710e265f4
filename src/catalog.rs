//! Static catalog of every telemetry metric the console renders.
//!
//! Each metric carries its ADX channel name, display label, unit, gauge
//! bounds and the table/column it is read from. Channel names follow the
//! device firmware's topic scheme (`/INV/...`, `/BMS/...`, `/SYS/...`).

use std::str::FromStr;

use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Which backend table a metric is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceTable {
    /// `Telemetry` table, numeric readings in `value_double`.
    Telemetry,
    /// `Alarms` table, event state in `value` (0 = inactive, 1 = active).
    Alarms,
}

/// Display grouping, mirrors the dashboard sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "title_case")]
pub enum Category {
    Wifi,
    Inverter,
    Solar,
    Grid,
    Battery,
    Load,
}

/// Static description of one metric.
#[derive(Debug, Clone, Copy)]
pub struct MetricSpec {
    pub label: &'static str,
    pub unit: &'static str,
    pub channel: &'static str,
    pub table: SourceTable,
    pub category: Category,
    /// Gauge scale for snapshot rendering.
    pub bounds: (f64, f64),
    pub decimals: usize,
    /// Sentinel reading that means the device is offline rather than a
    /// real measurement (-127 dBm for Wi-Fi signal).
    pub offline_value: Option<f64>,
    /// File prefix for CSV export.
    pub csv_prefix: &'static str,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, Display, AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Metric {
    WifiSignal,
    InverterMode,
    Pv1Voltage,
    Pv2Voltage,
    Pv3Voltage,
    Pv4Voltage,
    BatteryVoltage,
    GridVoltageL1,
    GridVoltageL2,
    GridCurrentL1,
    GridCurrentL2,
    GridFrequency,
    GridPower,
    LoadPower,
    Battery1Voltage,
    Battery1Temperature,
    Battery1Soc,
    Battery1Current,
    Battery2Voltage,
    Battery2Temperature,
    Battery2Soc,
    Battery2Current,
    Battery3Voltage,
    Battery3Temperature,
    Battery3Soc,
    Battery3Current,
    LoadVoltageL1,
    LoadVoltageL2,
    LoadCurrentL1,
    LoadCurrentL2,
    LoadFrequency,
    BatteryMainRelay,
}

impl Metric {
    pub fn spec(&self) -> MetricSpec {
        use Category::*;
        use Metric::*;
        use SourceTable::*;

        // Shorthand keeps the table below readable.
        fn m(
            label: &'static str,
            unit: &'static str,
            channel: &'static str,
            category: Category,
            bounds: (f64, f64),
            decimals: usize,
            csv_prefix: &'static str,
        ) -> MetricSpec {
            MetricSpec {
                label,
                unit,
                channel,
                table: SourceTable::Telemetry,
                category,
                bounds,
                decimals,
                offline_value: None,
                csv_prefix,
            }
        }

        match self {
            WifiSignal => MetricSpec {
                offline_value: Some(-127.0),
                ..m(
                    "Wi-Fi Signal Strength",
                    "dBm",
                    "/SCC/WIFI/STAT/SIGNAL_STRENGTH",
                    Wifi,
                    (-100.0, 0.0),
                    0,
                    "wifi_signal",
                )
            },
            InverterMode => m(
                "Inverter Mode",
                "",
                "INV/DEV/STAT/OPERATING_STATE",
                Inverter,
                (-1.0, 9.0),
                0,
                "inverter_mode",
            ),
            Pv1Voltage => m("PV1 Voltage", "V", "/INV/DCPORT/STAT/PV1/V", Solar, (0.0, 500.0), 1, "pv1_voltage"),
            Pv2Voltage => m("PV2 Voltage", "V", "/INV/DCPORT/STAT/PV2/V", Solar, (0.0, 500.0), 1, "pv2_voltage"),
            Pv3Voltage => m("PV3 Voltage", "V", "/INV/DCPORT/STAT/PV3/V", Solar, (0.0, 500.0), 1, "pv3_voltage"),
            Pv4Voltage => m("PV4 Voltage", "V", "/INV/DCPORT/STAT/PV4/V", Solar, (0.0, 500.0), 1, "pv4_voltage"),
            BatteryVoltage => m("Battery Voltage", "V", "/INV/DCPORT/STAT/BATTERY/V", Battery, (0.0, 60.0), 1, "battery_voltage"),
            GridVoltageL1 => m("Grid Voltage RMS L1", "V", "/INV/ACPORT/STAT/VRMS_L1N", Grid, (0.0, 280.0), 1, "grid_voltage_l1"),
            GridVoltageL2 => m("Grid Voltage RMS L2", "V", "/INV/ACPORT/STAT/VRMS_L2N", Grid, (0.0, 280.0), 1, "grid_voltage_l2"),
            GridCurrentL1 => m("Grid Current RMS L1", "A", "/INV/ACPORT/STAT/IRMS_L1", Grid, (0.0, 100.0), 2, "grid_current_l1"),
            GridCurrentL2 => m("Grid Current RMS L2", "A", "/INV/ACPORT/STAT/IRMS_L2", Grid, (0.0, 100.0), 2, "grid_current_l2"),
            GridFrequency => m("Grid Frequency Total", "Hz", "/INV/ACPORT/STAT/FREQ_TOTAL", Grid, (55.0, 65.0), 2, "grid_frequency_total"),
            GridPower => m("Grid Power", "W", "/INV/ACPORT/STAT/GRID/P", Grid, (-10_000.0, 10_000.0), 0, "grid_power"),
            LoadPower => m("Load Power", "W", "/INV/ACPORT/STAT/LOAD/P", Load, (0.0, 10_000.0), 0, "load_power"),
            Battery1Voltage => m("Battery 1 Voltage", "V", "/BMS/MODULE1/STAT/V", Battery, (40.0, 60.0), 1, "battery1_voltage"),
            Battery1Temperature => m("Battery 1 Temperature", "°C", "/BMS/MODULE1/STAT/TEMP", Battery, (0.0, 60.0), 1, "battery1_temp"),
            Battery1Soc => m("Battery 1 SoC", "%", "/BMS/MODULE1/STAT/USER_SOC", Battery, (0.0, 100.0), 0, "battery1_soc"),
            Battery1Current => m("Battery 1 Current", "A", "/BMS/MODULE1/STAT/I", Battery, (-50.0, 50.0), 2, "battery1_current"),
            Battery2Voltage => m("Battery 2 Voltage", "V", "/BMS/MODULE2/STAT/V", Battery, (40.0, 60.0), 1, "battery2_voltage"),
            Battery2Temperature => m("Battery 2 Temperature", "°C", "/BMS/MODULE2/STAT/TEMP", Battery, (0.0, 60.0), 1, "battery2_temp"),
            Battery2Soc => m("Battery 2 SoC", "%", "/BMS/MODULE2/STAT/USER_SOC", Battery, (0.0, 100.0), 0, "battery2_soc"),
            Battery2Current => m("Battery 2 Current", "A", "/BMS/MODULE2/STAT/I", Battery, (-50.0, 50.0), 2, "battery2_current"),
            Battery3Voltage => m("Battery 3 Voltage", "V", "/BMS/MODULE3/STAT/V", Battery, (40.0, 60.0), 1, "battery3_voltage"),
            Battery3Temperature => m("Battery 3 Temperature", "°C", "/BMS/MODULE3/STAT/TEMP", Battery, (0.0, 60.0), 1, "battery3_temp"),
            Battery3Soc => m("Battery 3 SoC", "%", "/BMS/MODULE3/STAT/USER_SOC", Battery, (0.0, 100.0), 0, "battery3_soc"),
            Battery3Current => m("Battery 3 Current", "A", "/BMS/MODULE3/STAT/I", Battery, (-50.0, 50.0), 2, "battery3_current"),
            LoadVoltageL1 => m("Load Voltage L1 RMS", "V", "/SYS/MEAS/STAT/PANEL/VRMS_L1N", Load, (0.0, 280.0), 1, "load_voltage_l1"),
            LoadVoltageL2 => m("Load Voltage L2 RMS", "V", "/SYS/MEAS/STAT/PANEL/VRMS_L2N", Load, (0.0, 280.0), 1, "load_voltage_l2"),
            LoadCurrentL1 => m("Load Current L1 RMS", "A", "/SYS/MEAS/STAT/LOAD/IRMS_L1", Load, (0.0, 100.0), 2, "load_current_l1"),
            LoadCurrentL2 => m("Load Current L2 RMS", "A", "/SYS/MEAS/STAT/LOAD/IRMS_L2", Load, (0.0, 100.0), 2, "load_current_l2"),
            LoadFrequency => m("Load Frequency Total", "Hz", "/SYS/MEAS/STAT/PANEL/FREQ_TOTAL", Load, (55.0, 65.0), 2, "load_frequency_total"),
            BatteryMainRelay => MetricSpec {
                table: Alarms,
                ..m(
                    "Battery Main Relay Status",
                    "",
                    "/BMS/CLUSTER/EVENT/ALARM/MAIN_RELAY_ERROR",
                    Battery,
                    (0.0, 1.0),
                    0,
                    "battery_main_relay",
                )
            },
        }
    }

    /// Parse a CLI metric name, e.g. `wifi_signal` or `battery2_soc`.
    pub fn parse(name: &str) -> Option<Metric> {
        Metric::from_str(name).ok()
    }
}

/// Inverter operating state reported on `INV/DEV/STAT/OPERATING_STATE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum InverterMode {
    #[strum(serialize = "INVALID")]
    Invalid,
    #[strum(serialize = "UNDEFINED")]
    Undefined,
    #[strum(serialize = "OFFLINE")]
    Offline,
    #[strum(serialize = "DISABLED")]
    Disabled,
    #[strum(serialize = "STANDBY")]
    Standby,
    #[strum(serialize = "NORMAL")]
    Normal,
    #[strum(serialize = "LIMP MODE")]
    LimpMode,
    #[strum(serialize = "FAULT (AUTO)")]
    FaultAuto,
    #[strum(serialize = "FAULT (MANUAL)")]
    FaultManual,
    #[strum(serialize = "FW UPDATE")]
    FirmwareUpdate,
    #[strum(serialize = "SELF TEST")]
    SelfTest,
}

impl InverterMode {
    /// Decode the raw telemetry value. Anything outside the known range
    /// maps to `Invalid`, matching the device documentation.
    pub fn from_value(value: f64) -> InverterMode {
        if !value.is_finite() || value.fract() != 0.0 {
            return InverterMode::Invalid;
        }
        match value as i64 {
            0 => InverterMode::Undefined,
            1 => InverterMode::Offline,
            2 => InverterMode::Disabled,
            3 => InverterMode::Standby,
            4 => InverterMode::Normal,
            5 => InverterMode::LimpMode,
            6 => InverterMode::FaultAuto,
            7 => InverterMode::FaultManual,
            8 => InverterMode::FirmwareUpdate,
            9 => InverterMode::SelfTest,
            _ => InverterMode::Invalid,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            InverterMode::Invalid => "Invalid state",
            InverterMode::Undefined => "State not defined",
            InverterMode::Offline => "System offline",
            InverterMode::Disabled => "Inverter disabled",
            InverterMode::Standby => "Ready and waiting",
            InverterMode::Normal => "Operating normally",
            InverterMode::LimpMode => "Reduced capacity",
            InverterMode::FaultAuto => "Auto-clearing fault",
            InverterMode::FaultManual => "Manual reset required",
            InverterMode::FirmwareUpdate => "Firmware updating",
            InverterMode::SelfTest => "Running diagnostics",
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, InverterMode::FaultAuto | InverterMode::FaultManual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_catalog_is_complete() {
        // wifi + mode + 4 PV + pack voltage + 5 grid + 2 power
        // + 12 battery module + 5 load + relay.
        assert_eq!(Metric::iter().count(), 32);
        for metric in Metric::iter() {
            let spec = metric.spec();
            assert!(!spec.label.is_empty());
            assert!(!spec.channel.is_empty());
            assert!(spec.bounds.0 < spec.bounds.1, "{metric} bounds inverted");
            assert!(!spec.csv_prefix.is_empty());
        }
    }

    #[test]
    fn test_metric_names_round_trip() {
        for metric in Metric::iter() {
            let name = metric.to_string();
            assert_eq!(Metric::parse(&name), Some(metric), "{name}");
        }
        assert_eq!(Metric::parse("wifi_signal"), Some(Metric::WifiSignal));
        assert_eq!(Metric::parse("battery2_soc"), Some(Metric::Battery2Soc));
        assert_eq!(Metric::parse("nonsense"), None);
    }

    #[test]
    fn test_relay_uses_alarms_table() {
        let spec = Metric::BatteryMainRelay.spec();
        assert_eq!(spec.table, SourceTable::Alarms);
        for metric in Metric::iter().filter(|m| *m != Metric::BatteryMainRelay) {
            assert_eq!(metric.spec().table, SourceTable::Telemetry);
        }
    }

    #[test]
    fn test_wifi_offline_sentinel() {
        assert_eq!(Metric::WifiSignal.spec().offline_value, Some(-127.0));
        assert_eq!(Metric::GridPower.spec().offline_value, None);
    }

    #[test]
    fn test_inverter_mode_decoding() {
        assert_eq!(InverterMode::from_value(4.0), InverterMode::Normal);
        assert_eq!(InverterMode::from_value(0.0), InverterMode::Undefined);
        assert_eq!(InverterMode::from_value(9.0), InverterMode::SelfTest);
        assert_eq!(InverterMode::from_value(-1.0), InverterMode::Invalid);
        assert_eq!(InverterMode::from_value(42.0), InverterMode::Invalid);
        assert_eq!(InverterMode::from_value(4.5), InverterMode::Invalid);
        assert_eq!(InverterMode::from_value(f64::NAN), InverterMode::Invalid);
    }

    #[test]
    fn test_inverter_mode_labels() {
        assert_eq!(InverterMode::Normal.to_string(), "NORMAL");
        assert_eq!(InverterMode::FaultManual.to_string(), "FAULT (MANUAL)");
        assert!(InverterMode::FaultAuto.is_fault());
        assert!(!InverterMode::Standby.is_fault());
    }
}
