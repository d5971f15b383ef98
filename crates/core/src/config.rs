//! Client configuration: who the player is, where results go, and the
//! commands making up each phase.

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use tracing::debug;
use utoipa::ToSchema;

use crate::domain::{CommandPhase, ConductorTest, PhaseKind, Step};
use crate::error::{CoreError, Result};

pub const DEFAULT_CMD_PORT: u16 = 6970;
pub const DEFAULT_RESULTS_PORT: u16 = 6971;

/// Addresses of the conductor and the player it drives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Coordinator {
    /// Host the player reports results to
    pub conductor: String,
    /// Host the player listens on for commands
    pub player: String,
    #[serde(deserialize_with = "port_from_number_or_string")]
    pub cmdport: u16,
    #[serde(deserialize_with = "port_from_number_or_string")]
    pub resultsport: u16,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self {
            conductor: "localhost".to_string(),
            player: "localhost".to_string(),
            cmdport: DEFAULT_CMD_PORT,
            resultsport: DEFAULT_RESULTS_PORT,
        }
    }
}

/// Ordered `key -> command` table. Document order is kept since it is the
/// order the steps run in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepTable(Vec<(String, String)>);

impl StepTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, command: impl Into<String>) -> &mut Self {
        self.0.push((key.into(), command.into()));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StepTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl Serialize for StepTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, command) in &self.0 {
            map.serialize_entry(key, command)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for StepTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = StepTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of step names to commands")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<StepTable, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, command)) = access.next_entry::<String, String>()? {
                    entries.push((key, command));
                }
                Ok(StepTable(entries))
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

fn port_from_number_or_string<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPort {
        Number(u16),
        Text(String),
    }

    match RawPort::deserialize(deserializer)? {
        RawPort::Number(port) => Ok(port),
        RawPort::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid port '{}'", text))),
    }
}

/// Everything needed to drive one player.
///
/// In every section, keys containing `spawn` start the command in the
/// background and keys like `timeout60` carry the timeout in seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ClientConfig {
    #[serde(alias = "Coordinator")]
    pub coordinator: Coordinator,
    #[serde(default, alias = "Startup")]
    #[schema(value_type = Object)]
    #[cfg_attr(feature = "typescript", ts(type = "Record<string, string>"))]
    pub startup: StepTable,
    #[serde(default, alias = "Run")]
    #[schema(value_type = Object)]
    #[cfg_attr(feature = "typescript", ts(type = "Record<string, string>"))]
    pub run: StepTable,
    #[serde(default, alias = "Collect")]
    #[schema(value_type = Object)]
    #[cfg_attr(feature = "typescript", ts(type = "Record<string, string>"))]
    pub collect: StepTable,
    #[serde(default, alias = "Reset")]
    #[schema(value_type = Object)]
    #[cfg_attr(feature = "typescript", ts(type = "Record<string, string>"))]
    pub reset: StepTable,
}

impl ClientConfig {
    /// Parse and validate a JSON client config.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        debug!(
            player = %config.coordinator.player,
            conductor = %config.coordinator.conductor,
            startup = config.startup.len(),
            run = config.run.len(),
            collect = config.collect.len(),
            reset = config.reset.len(),
            "Client config loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let coordinator = &self.coordinator;
        if coordinator.conductor.trim().is_empty() {
            return Err(CoreError::config("conductor host is empty"));
        }
        if coordinator.player.trim().is_empty() {
            return Err(CoreError::config("player host is empty"));
        }
        if coordinator.cmdport == 0 {
            return Err(CoreError::config("cmdport must be non-zero"));
        }
        if coordinator.resultsport == 0 {
            return Err(CoreError::config("resultsport must be non-zero"));
        }
        Ok(())
    }

    pub fn table(&self, kind: PhaseKind) -> &StepTable {
        match kind {
            PhaseKind::Startup => &self.startup,
            PhaseKind::Run => &self.run,
            PhaseKind::Collect => &self.collect,
            PhaseKind::Reset => &self.reset,
        }
    }

    /// Build one phase per kind, each reporting to the conductor's results port.
    pub fn build_phases(&self) -> ClientPhases {
        let build = |kind: PhaseKind| -> CommandPhase {
            let mut phase = CommandPhase::new(
                self.coordinator.conductor.clone(),
                self.coordinator.resultsport,
            );
            for (key, command) in self.table(kind).iter() {
                phase.append(step_for_key(key, command));
            }
            debug!(phase = %kind, steps = phase.steps.len(), "Built phase");
            phase
        };

        ClientPhases {
            startup: build(PhaseKind::Startup),
            run: build(PhaseKind::Run),
            collect: build(PhaseKind::Collect),
            reset: build(PhaseKind::Reset),
        }
    }
}

/// A key containing `spawn` starts the command in the background. A key
/// containing `timeout` followed only by digits (`timeout60`) sets the
/// timeout; any other key gives a default step.
fn step_for_key(key: &str, command: &str) -> Step {
    if key.contains("spawn") {
        return Step::spawned(command);
    }
    if key.contains("timeout") {
        let digits = key.replace("timeout", "");
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(secs) = digits.parse::<u64>() {
                return Step::new(command).with_timeout(secs);
            }
        }
        debug!(key, "Timeout key carries no number, using default timeout");
    }
    Step::new(command)
}

/// The four phases built for one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientPhases {
    pub startup: CommandPhase,
    pub run: CommandPhase,
    pub collect: CommandPhase,
    pub reset: CommandPhase,
}

impl ClientPhases {
    pub fn get(&self, kind: PhaseKind) -> &CommandPhase {
        match kind {
            PhaseKind::Startup => &self.startup,
            PhaseKind::Run => &self.run,
            PhaseKind::Collect => &self.collect,
            PhaseKind::Reset => &self.reset,
        }
    }

    /// Phase list holding the selected phases in the order given.
    pub fn select(&self, kinds: &[PhaseKind]) -> ConductorTest<CommandPhase> {
        kinds.iter().map(|kind| self.get(*kind).clone()).collect()
    }

    /// Phase list holding all four phases in canonical order.
    pub fn into_test(self) -> ConductorTest<CommandPhase> {
        [self.startup, self.run, self.collect, self.reset]
            .into_iter()
            .collect()
    }
}
