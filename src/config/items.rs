use std::{
    net::{Ipv4Addr, Ipv6Addr},
    str::FromStr,
};

use crate::logger::Diagnostics;

use super::{file::ConfigSource, ConfigError};

// Typed access to configuration items.
// Every lookup takes an optional fallback that is used when the item is absent; every failure is
// reported as a fatal diagnostic that names the item.
pub struct ConfigItems<'a> {
    source: &'a dyn ConfigSource,
    diagnostics: Diagnostics<'a>,
}

impl<'a> ConfigItems<'a> {
    pub fn new(source: &'a dyn ConfigSource, diagnostics: Diagnostics<'a>) -> ConfigItems<'a> {
        ConfigItems {
            source,
            diagnostics,
        }
    }

    fn raw<'b>(
        &'b self,
        name: &'static str,
        default: Option<&'b str>,
    ) -> Result<&'b str, ConfigError> {
        match self.source.item(name).or(default) {
            Some(value) => Ok(value),
            None => {
                self.diagnostics.fatal(format_args!("{} config item needed", name));
                Err(ConfigError::MissingConfiguration(name))
            }
        }
    }

    pub fn string(&self, name: &'static str, default: Option<&str>) -> Result<String, ConfigError> {
        self.raw(name, default).map(|value| value.to_string())
    }

    // Any value other than "no" counts as enabled.
    pub fn flag(&self, name: &'static str, default: Option<&str>) -> Result<bool, ConfigError> {
        self.raw(name, default).map(|value| value != "no")
    }

    pub fn int16(&self, name: &'static str, default: Option<&str>) -> Result<i16, ConfigError> {
        let value = self.raw(name, default)?;
        // Leading whitespace and a sign are accepted, trailing characters are not.
        let parsed = match i64::from_str(value.trim_start()) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.diagnostics.fatal(format_args!(
                    "{} config item is not numeric: {} ({})",
                    name, value, err
                ));
                return Err(ConfigError::NotNumeric(name, value.to_string()));
            }
        };
        match i16::try_from(parsed) {
            Ok(parsed) => Ok(parsed),
            Err(_) => {
                self.diagnostics.fatal(format_args!(
                    "{} config item is too big/small: {}",
                    name, parsed
                ));
                Err(ConfigError::OutOfRange(name, parsed))
            }
        }
    }

    pub fn ipv4(&self, name: &'static str, default: Option<&str>) -> Result<Ipv4Addr, ConfigError> {
        let value = self.raw(name, default)?;
        Ipv4Addr::from_str(value).map_err(|_| {
            self.diagnostics.fatal(format_args!(
                "invalid IPv4 address specified for {}: {}",
                name, value
            ));
            ConfigError::InvalidAddress(name, value.to_string())
        })
    }

    pub fn ipv6(&self, name: &'static str, default: Option<&str>) -> Result<Ipv6Addr, ConfigError> {
        let value = self.raw(name, default)?;
        Ipv6Addr::from_str(value).map_err(|_| {
            self.diagnostics.fatal(format_args!(
                "invalid IPv6 address specified for {}: {}",
                name, value
            ));
            ConfigError::InvalidAddress(name, value.to_string())
        })
    }
}
