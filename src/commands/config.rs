use crate::areas::repository::Repository;
use crate::errors::LitError;

impl Repository {
    /// `config <key>` prints, `config <key> <value>` sets
    pub fn config_command(
        &self,
        key: &str,
        value: Option<&str>,
        unset: bool,
    ) -> anyhow::Result<()> {
        if unset {
            let _lock = self.lock()?;
            let mut config = self.config();
            if !config.unset(key)? {
                return Err(LitError::NotFound {
                    kind: "config key",
                    name: key.to_string(),
                }
                .into());
            }
            return config.save();
        }

        match value {
            Some(value) => {
                let _lock = self.lock()?;
                let mut config = self.config();
                config.set(key, value)?;
                config.save()
            }
            None => {
                let config = self.config();
                match config.get(key) {
                    Some(value) => {
                        drop(config);
                        writeln!(self.writer(), "{value}")?;
                        Ok(())
                    }
                    None => Err(LitError::NotFound {
                        kind: "config key",
                        name: key.to_string(),
                    }
                    .into()),
                }
            }
        }
    }

    pub fn config_list(&self) -> anyhow::Result<()> {
        let entries = self.config().entries();
        for (key, value) in entries {
            writeln!(self.writer(), "{key}={value}")?;
        }

        Ok(())
    }
}
