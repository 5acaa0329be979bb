use crate::core::ephemeris::{FIRST_VALID_YEAR, LAST_VALID_YEAR};
use crate::utils::error::{AspectError, Result};
use chrono::{Datelike, Days, NaiveDate};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(AspectError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(AspectError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

/// Output file names are joined onto the output directory, so they must not
/// carry directory components of their own.
pub fn validate_file_name(field_name: &str, name: &str, extension: &str) -> Result<()> {
    validate_path(field_name, name)?;

    if name.contains('/') || name.contains('\\') {
        return Err(AspectError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: name.to_string(),
            reason: "File name must not contain path separators".to_string(),
        });
    }

    let has_extension = std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false);
    if !has_extension {
        return Err(AspectError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: name.to_string(),
            reason: format!("File name must end with .{}", extension),
        });
    }

    Ok(())
}

/// Every day of a window starting at `start` must fall inside the ephemeris
/// years. A missing start means today and is checked at run time.
pub fn validate_window(field_name: &str, start: Option<NaiveDate>, days: usize) -> Result<()> {
    let Some(start) = start else {
        return Ok(());
    };

    let last = u64::try_from(days.saturating_sub(1))
        .ok()
        .and_then(|offset| start.checked_add_days(Days::new(offset)));
    let in_range = |date: NaiveDate| (FIRST_VALID_YEAR..=LAST_VALID_YEAR).contains(&date.year());

    match last {
        Some(last) if in_range(start) && in_range(last) => Ok(()),
        _ => Err(AspectError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: start.to_string(),
            reason: format!(
                "A {}-day window must stay within {}-{}",
                days, FIRST_VALID_YEAR, LAST_VALID_YEAR
            ),
        }),
    }
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AspectError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if !(value >= min && value <= max) {
        return Err(AspectError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// Remotes are either plain names such as `origin` or URLs with a scheme
/// git can push to.
pub fn validate_remote(field_name: &str, remote: &str) -> Result<()> {
    validate_non_empty_string(field_name, remote)?;

    if !remote.contains("://") {
        return Ok(());
    }

    match Url::parse(remote) {
        Ok(url) => match url.scheme() {
            "https" | "http" | "ssh" | "file" => Ok(()),
            scheme => Err(AspectError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: remote.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(AspectError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: remote.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}
