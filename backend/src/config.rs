use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Service settings, read from the Rocket figment (`Rocket.toml`, `ROCKET_*` env vars).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Shortname of this service on the fabric. Also names the store file.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Directory holding `<service_name>/<service_name>.json`.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,

    /// Published with the entity id after every successful vote.
    #[serde(default = "default_voted_topic")]
    pub voted_topic: String,

    /// Inbound topic whose payload is an entity id to forget.
    #[serde(default = "default_delete_topic")]
    pub delete_topic: String,

    /// Where the list of topics to forward is announced at startup.
    #[serde(default = "default_subscriptions_topic")]
    pub subscriptions_topic: String,

    /// Buffered events per subscriber before it starts lagging.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_service_name() -> String {
    "voting".to_string()
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("./store")
}

fn default_voted_topic() -> String {
    "voting/voted".to_string()
}

fn default_delete_topic() -> String {
    "voting/delete".to_string()
}

fn default_subscriptions_topic() -> String {
    "bff/makesubscriptions".to_string()
}

fn default_event_capacity() -> usize {
    64
}

impl Config {
    pub fn store_file(&self) -> PathBuf {
        self.store_dir
            .join(&self.service_name)
            .join(format!("{}.json", self.service_name))
    }

    /// Topics this service asks the front-end gateway to forward.
    pub fn subscriptions(&self) -> Vec<String> {
        vec![self.voted_topic.clone()]
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            store_dir: default_store_dir(),
            voted_topic: default_voted_topic(),
            delete_topic: default_delete_topic(),
            subscriptions_topic: default_subscriptions_topic(),
            event_capacity: default_event_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::figment::{providers::Serialized, Figment};

    #[test]
    fn empty_figment_uses_defaults() {
        let config: Config = Figment::new().extract().expect("defaults should apply");
        assert_eq!(config, Config::default());
        assert_eq!(config.store_file(), PathBuf::from("./store/voting/voting.json"));
        assert_eq!(config.subscriptions(), vec!["voting/voted".to_string()]);
    }

    #[test]
    fn partial_overrides() {
        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(("voted_topic", "voting-voted"))
            .merge(("service_name", "social-voting"))
            .extract()
            .expect("should parse");
        assert_eq!(config.voted_topic, "voting-voted");
        assert_eq!(config.store_file(), PathBuf::from("./store/social-voting/social-voting.json"));
        assert_eq!(config.delete_topic, "voting/delete");
    }
}
