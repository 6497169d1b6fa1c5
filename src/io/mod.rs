use std::fs::File;
use std::io::{BufReader,Read};
use std::path::Path;
use color_eyre::eyre::{Result, WrapErr};
use serde::de::DeserializeOwned;
use crate::sensors::camera::StereoCalibration;
use crate::slam::runtime_parameters::SlamConfig;

pub fn parse_yaml<T: DeserializeOwned>(contents: &str) -> Result<T> {
    serde_yaml::from_str(contents).wrap_err("malformed yaml")
}

pub fn load_yaml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let file = File::open(file_path).wrap_err_with(|| format!("could not open {}", file_path.display()))?;
    let mut reader = BufReader::new(file);
    let mut contents = String::new();
    reader.read_to_string(&mut contents).wrap_err_with(|| format!("could not read {}", file_path.display()))?;
    parse_yaml(&contents).wrap_err_with(|| format!("could not parse {}", file_path.display()))
}

/**
 * Parses and validates a filter configuration
 */
pub fn load_config(file_path: &Path) -> Result<SlamConfig> {
    let config: SlamConfig = load_yaml(file_path)?;
    config.validate().wrap_err_with(|| format!("invalid configuration in {}", file_path.display()))?;
    Ok(config)
}

pub fn load_calibration(file_path: &Path) -> Result<StereoCalibration> {
    let calibration: StereoCalibration = load_yaml(file_path)?;
    calibration.validate().wrap_err_with(|| format!("invalid calibration in {}", file_path.display()))?;
    Ok(calibration)
}

pub fn save_yaml<T: serde::Serialize>(value: &T, file_path: &Path) -> Result<()> {
    let contents = serde_yaml::to_string(value).wrap_err("could not serialize to yaml")?;
    std::fs::write(file_path, contents).wrap_err_with(|| format!("could not write {}", file_path.display()))
}
