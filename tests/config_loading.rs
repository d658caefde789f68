//! Configuration loading through the full provider chain
//!
//! Each test runs inside a `figment::Jail`, which gives it a scratch working
//! directory and restores the environment afterwards.

use encoder_daq::config::AppConfig;
use encoder_daq::hardware::InterfaceType;
use encoder_daq::logging::OutputFormat;
use encoder_daq::unwrap::ReferenceMode;
use figment::Jail;
use std::io::Write;

#[test]
fn test_missing_file_uses_defaults() {
    Jail::expect_with(|_jail| {
        let config = AppConfig::load_from("absent.toml").map_err(|e| e.to_string())?;
        assert_eq!(config, AppConfig::default());
        Ok(())
    });
}

#[test]
fn test_file_overrides_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "daq.toml",
            r#"
                [application]
                log_level = "debug"
                log_format = "json"

                [device]
                interface = "usb"
                descriptor_index = 1
                seed = 42

                [acquisition]
                high_channel = 3
                max_iterations = 250

                [unwrap]
                tolerance_ratio = 0.8

                [unwrap.reference]
                mode = "fixed"
                full_scale = 4.096
            "#,
        )?;

        let config = AppConfig::load_from("daq.toml").map_err(|e| e.to_string())?;
        assert_eq!(config.application.log_level, "debug");
        assert_eq!(config.application.log_format, OutputFormat::Json);
        assert_eq!(config.device.interface, InterfaceType::Usb);
        assert_eq!(config.device.descriptor_index, 1);
        assert_eq!(config.device.seed, Some(42));
        assert_eq!(config.acquisition.low_channel, 0);
        assert_eq!(config.acquisition.high_channel, 3);
        assert_eq!(config.acquisition.max_iterations, Some(250));
        assert_eq!(config.unwrap.tolerance_ratio, 0.8);
        assert_eq!(
            config.unwrap.reference,
            ReferenceMode::Fixed { full_scale: 4.096 }
        );
        assert!(config.validate().is_ok());
        Ok(())
    });
}

#[test]
fn test_env_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "daq.toml",
            r#"
                [acquisition]
                high_channel = 5
                poll_interval_ms = 10
            "#,
        )?;
        jail.set_env("ENCODER_DAQ_ACQUISITION__HIGH_CHANNEL", "3");
        jail.set_env("ENCODER_DAQ_APPLICATION__LOG_LEVEL", "info");

        let config = AppConfig::load_from("daq.toml").map_err(|e| e.to_string())?;
        assert_eq!(config.acquisition.high_channel, 3);
        assert_eq!(config.acquisition.poll_interval_ms, 10);
        assert_eq!(config.application.log_level, "info");
        Ok(())
    });
}

#[test]
fn test_invalid_values_load_but_fail_validation() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "daq.toml",
            r#"
                [acquisition]
                low_channel = 6
                high_channel = 2
            "#,
        )?;

        let config = AppConfig::load_from("daq.toml").map_err(|e| e.to_string())?;
        assert!(config.validate().is_err());
        Ok(())
    });
}

#[test]
fn test_malformed_file_is_an_error() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "daq.toml",
            r#"
                [acquisition]
                high_channel = "seven"
            "#,
        )?;

        assert!(AppConfig::load_from("daq.toml").is_err());
        Ok(())
    });
}

#[test]
fn test_shipped_config_matches_defaults() {
    Jail::expect_with(|_jail| {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/encoder_daq.toml");
        let config = AppConfig::load_from(path).map_err(|e| e.to_string())?;
        assert!(config.validate().is_ok());
        assert_eq!(config.acquisition, AppConfig::default().acquisition);
        assert_eq!(config.unwrap, AppConfig::default().unwrap);
        Ok(())
    });
}

#[test]
fn test_rendered_config_loads_back() {
    let mut config = AppConfig::default();
    config.device.seed = Some(9);
    config.acquisition.high_channel = 2;
    config.acquisition.max_iterations = Some(10);
    config.unwrap.reference = ReferenceMode::Fixed { full_scale: 2.5 };

    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(config.to_toml_string().unwrap().as_bytes())
        .unwrap();
    file.flush().unwrap();

    Jail::expect_with(|_jail| {
        let loaded = AppConfig::load_from(file.path()).map_err(|e| e.to_string())?;
        assert_eq!(loaded, config);
        Ok(())
    });
}
