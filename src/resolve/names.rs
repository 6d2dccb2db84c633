//! Named package resolution
//!
//! Call targets and type strings may name a package as `@org/app` or
//! `@org/app/<version>`. The stage resolves every name it has not seen
//! before through the lookup client, in batches, and remembers the answer
//! in its own cache. Intents carry their type string under the `type` key of
//! their data; it is rewritten like any other type.

use super::{BuildOptions, Flow, ResolutionStage};
use crate::cache::ObjectCache;
use crate::metrics::metrics;
use crate::tx_builder::{BuildError, Command, PackageRef, TransactionBuilder};
use crate::types::{normalize_type, Address};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

static NAMED_PACKAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@[\w-]+/[\w-]+(?:/\d+)?").expect("named package pattern is valid")
});

#[derive(Debug)]
pub struct NamedPackageStage {
    cache: ObjectCache,
    max_batch_size: usize,
}

impl NamedPackageStage {
    pub fn new(max_batch_size: usize) -> Self {
        Self {
            cache: ObjectCache::new(),
            max_batch_size: max_batch_size.max(1),
        }
    }

    async fn resolve_names(
        &self,
        names: BTreeSet<String>,
        options: &BuildOptions,
    ) -> Result<HashMap<String, Address>, BuildError> {
        let mut resolved = HashMap::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match self.cache.get_package(&name) {
                Some(address) => {
                    resolved.insert(name, address);
                }
                None => missing.push(name),
            }
        }
        if missing.is_empty() {
            return Ok(resolved);
        }

        let lookup = options.require_lookup("resolve named packages")?;
        for batch in missing.chunks(self.max_batch_size) {
            let found = lookup.resolve_packages(batch).await?;
            for name in batch {
                let address = found
                    .get(name)
                    .copied()
                    .ok_or_else(|| BuildError::UnresolvedName(name.clone()))?;
                self.cache.set_package(name, address);
                resolved.insert(name.clone(), address);
            }
            metrics().names_resolved.inc_by(batch.len() as u64);
        }
        debug!(count = missing.len(), "resolved named packages");
        Ok(resolved)
    }
}

fn collect_names(builder: &TransactionBuilder) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let mut scan = |text: &str| {
        for found in NAMED_PACKAGE.find_iter(text) {
            names.insert(found.as_str().to_string());
        }
    };
    for command in builder.commands() {
        match command {
            Command::MoveCall(call) => {
                if let PackageRef::Named(name) = &call.package {
                    scan(name);
                }
                call.type_arguments.iter().for_each(|t| scan(t));
            }
            Command::MakeMoveVec {
                element_type: Some(t),
                ..
            } => scan(t),
            Command::Intent(intent) => {
                if let Some(t) = intent.data.get("type").and_then(|v| v.as_str()) {
                    scan(t);
                }
            }
            _ => {}
        }
    }
    names
}

fn rewrite_type(text: &str, resolved: &HashMap<String, Address>) -> Result<String, BuildError> {
    if !text.contains('@') {
        return Ok(text.to_string());
    }
    let replaced = NAMED_PACKAGE.replace_all(text, |caps: &Captures| {
        resolved
            .get(&caps[0])
            .map(Address::to_hex)
            .unwrap_or_else(|| caps[0].to_string())
    });
    normalize_type(&replaced).map_err(|e| BuildError::InvalidType(e.to_string()))
}

#[async_trait]
impl ResolutionStage for NamedPackageStage {
    fn name(&self) -> &'static str {
        "named_packages"
    }

    async fn resolve(
        &self,
        builder: &mut TransactionBuilder,
        options: &BuildOptions,
    ) -> Result<Flow, BuildError> {
        let names = collect_names(builder);
        if names.is_empty() {
            return Ok(Flow::Continue);
        }
        let resolved = self.resolve_names(names, options).await?;

        for command in builder.data.commands.iter_mut() {
            match command {
                Command::MoveCall(call) => {
                    if let PackageRef::Named(name) = &call.package {
                        let address = NAMED_PACKAGE
                            .find(name)
                            .and_then(|m| resolved.get(m.as_str()))
                            .copied()
                            .ok_or_else(|| BuildError::UnresolvedName(name.clone()))?;
                        call.package = PackageRef::Address(address);
                    }
                    for type_argument in call.type_arguments.iter_mut() {
                        *type_argument = rewrite_type(type_argument, &resolved)?;
                    }
                }
                Command::MakeMoveVec {
                    element_type: Some(t),
                    ..
                } => *t = rewrite_type(t, &resolved)?,
                Command::Intent(intent) => {
                    if let Some(serde_json::Value::String(t)) = intent.data.get_mut("type") {
                        *t = rewrite_type(t, &resolved)?;
                    }
                }
                _ => {}
            }
        }
        Ok(Flow::Continue)
    }
}
