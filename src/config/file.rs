use std::{collections::HashMap, fs, path::Path};

use log::debug;

// Named string items, as read from a configuration file.
pub trait ConfigSource {
    fn item(&self, name: &str) -> Option<&str>;
    fn is_empty(&self) -> bool;
}

#[derive(Clone, Debug, Default)]
pub struct ConfigFile {
    items: HashMap<String, String>,
}

impl ConfigFile {
    // An unreadable file produces an empty configuration; the caller decides if that's fatal.
    pub fn read(path: &Path) -> ConfigFile {
        match fs::read_to_string(path) {
            Ok(contents) => ConfigFile::parse(&contents),
            Err(err) => {
                debug!("Failed to read {}: {}", path.display(), err);
                ConfigFile::default()
            }
        }
    }

    // Parses `name value` lines. Everything after `#` is a comment, and `name=value` is also
    // accepted. When an item is repeated, the last value wins.
    pub fn parse(contents: &str) -> ConfigFile {
        let items = contents
            .lines()
            .filter_map(|line| {
                let line = match line.find('#') {
                    Some(comment_start) => &line[..comment_start],
                    None => line,
                };
                let line = line.trim();
                if line.is_empty() {
                    return None;
                }
                let separator = line.find(|c: char| c == '=' || c.is_ascii_whitespace());
                let (name, value) = match separator {
                    Some(separator) => (&line[..separator], &line[separator + 1..]),
                    None => (line, ""),
                };
                let value = value.trim_start();
                let value = value.strip_prefix('=').unwrap_or(value).trim();
                Some((name.to_string(), value.to_string()))
            })
            .collect::<HashMap<_, _>>();
        ConfigFile { items }
    }
}

impl ConfigSource for ConfigFile {
    fn item(&self, name: &str) -> Option<&str> {
        self.items.get(name).map(|value| value.as_str())
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clatd_conf() {
        let config = ConfigFile::parse(
            "# clatd configuration\n\
             \n\
             ipv4_local_subnet 192.0.0.4\n\
             plat_from_dns64   yes # detect\n\
             plat_from_dns64_hostname\tipv4only.arpa\n",
        );
        assert_eq!(config.item("ipv4_local_subnet"), Some("192.0.0.4"));
        assert_eq!(config.item("plat_from_dns64"), Some("yes"));
        assert_eq!(config.item("plat_from_dns64_hostname"), Some("ipv4only.arpa"));
        assert_eq!(config.item("mtu"), None);
        assert!(!config.is_empty());
    }

    #[test]
    fn accepts_equals_separator() {
        let config = ConfigFile::parse("mtu=1280\nipv4mtu = 1260\nplat_subnet= 64:ff9b::\n");
        assert_eq!(config.item("mtu"), Some("1280"));
        assert_eq!(config.item("ipv4mtu"), Some("1260"));
        assert_eq!(config.item("plat_subnet"), Some("64:ff9b::"));
    }

    #[test]
    fn empty_value_is_present() {
        let config = ConfigFile::parse("mtu\n");
        assert_eq!(config.item("mtu"), Some(""));
    }

    #[test]
    fn last_value_wins() {
        let config = ConfigFile::parse("mtu 1280\nmtu 1400\n");
        assert_eq!(config.item("mtu"), Some("1400"));
    }

    #[test]
    fn comments_only_is_empty() {
        assert!(ConfigFile::parse("# nothing here\n   \n").is_empty());
    }

    #[test]
    fn missing_file_is_empty() {
        let config = ConfigFile::read(Path::new("/nonexistent/clatd/clatd.conf"));
        assert!(config.is_empty());
    }
}
