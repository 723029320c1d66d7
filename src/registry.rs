//! アダプターレジストリ
//!
//! 設定ファイルのアダプター名から実装を引く。名前の先頭セグメント
//! (`radelt.work` なら `radelt`) がモジュールを表し、モジュールの
//! 登録関数が名前ごとに実装を登録する。

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use tracing::{error, info};

use crate::adapters;
use crate::config::AdapterSettings;
use crate::error::SyncError;
use crate::traits::{Destination, Source};

pub type SourceFactory = fn(AdapterSettings) -> Result<Box<dyn Source>, SyncError>;
pub type DestinationFactory = fn(AdapterSettings) -> Result<Box<dyn Destination>, SyncError>;

/// モジュールの登録関数 (レジストリ, 設定上の名前)
pub type RegisterFn = fn(&mut Registry, &str);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    Source,
    Destination,
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterKind::Source => write!(f, "source"),
            AdapterKind::Destination => write!(f, "destination"),
        }
    }
}

#[derive(Clone, Copy)]
pub enum AdapterFactory {
    Source(SourceFactory),
    Destination(DestinationFactory),
}

impl AdapterFactory {
    pub fn kind(&self) -> AdapterKind {
        match self {
            AdapterFactory::Source(_) => AdapterKind::Source,
            AdapterFactory::Destination(_) => AdapterKind::Destination,
        }
    }
}

#[derive(Clone)]
pub struct AdapterDescriptor {
    pub name: String,
    pub factory: AdapterFactory,
}

impl AdapterDescriptor {
    pub fn kind(&self) -> AdapterKind {
        self.factory.kind()
    }

    pub fn build_source(&self, settings: AdapterSettings) -> Result<Box<dyn Source>, SyncError> {
        match self.factory {
            AdapterFactory::Source(build) => build(settings),
            AdapterFactory::Destination(_) => Err(self.mismatch(AdapterKind::Source).into()),
        }
    }

    pub fn build_destination(
        &self,
        settings: AdapterSettings,
    ) -> Result<Box<dyn Destination>, SyncError> {
        match self.factory {
            AdapterFactory::Destination(build) => build(settings),
            AdapterFactory::Source(_) => Err(self.mismatch(AdapterKind::Destination).into()),
        }
    }

    fn mismatch(&self, expected: AdapterKind) -> AdapterLoadError {
        AdapterLoadError::KindMismatch {
            name: self.name.clone(),
            expected,
            actual: self.kind(),
        }
    }
}

impl fmt::Debug for AdapterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .finish()
    }
}

/// 登録関数を持つモジュール
#[derive(Clone, Copy)]
pub struct AdapterModule {
    pub key: &'static str,
    pub register: RegisterFn,
}

impl AdapterModule {
    pub const fn new(key: &'static str, register: RegisterFn) -> Self {
        Self { key, register }
    }
}

#[derive(Error, Debug)]
pub enum AdapterLoadError {
    #[error("アダプター {name} のモジュール {module} が見つかりません")]
    ModuleNotFound { name: String, module: String },

    #[error("モジュール {module} は {name} を登録しませんでした")]
    NotRegistered { name: String, module: String },

    #[error("アダプター {name} は {actual} です ({expected} として設定されています)")]
    KindMismatch {
        name: String,
        expected: AdapterKind,
        actual: AdapterKind,
    },
}

pub struct Registry {
    modules: Vec<AdapterModule>,
    adapters: HashMap<String, AdapterDescriptor>,
}

impl Registry {
    /// 組み込みアダプターのモジュール表を使う
    pub fn new() -> Self {
        Self::with_modules(adapters::MODULES.to_vec())
    }

    pub fn with_modules(modules: Vec<AdapterModule>) -> Self {
        Self {
            modules,
            adapters: HashMap::new(),
        }
    }

    /// 同じ名前が登録済みなら置き換える
    pub fn register(&mut self, name: &str, factory: AdapterFactory) {
        let descriptor = AdapterDescriptor {
            name: name.to_string(),
            factory,
        };
        info!("Added {} to the {} adapters", name, descriptor.kind());
        self.adapters.insert(name.to_string(), descriptor);
    }

    pub fn register_source(&mut self, name: &str, factory: SourceFactory) {
        self.register(name, AdapterFactory::Source(factory));
    }

    pub fn register_destination(&mut self, name: &str, factory: DestinationFactory) {
        self.register(name, AdapterFactory::Destination(factory));
    }

    pub fn resolve(&self, name: &str) -> Result<&AdapterDescriptor, SyncError> {
        self.adapters
            .get(name)
            .ok_or_else(|| SyncError::UnknownAdapter(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// 名前に対応するモジュールの登録関数を呼ぶ
    ///
    /// 登録関数がその名前を登録しなければ、以前の登録が残っていても `NotRegistered`。
    /// その場合、以前の登録は元に戻す。
    pub fn load_by_name(&mut self, name: &str) -> Result<(), AdapterLoadError> {
        let key = module_key(name);
        let module = self
            .modules
            .iter()
            .find(|module| module.key == key)
            .copied()
            .ok_or_else(|| AdapterLoadError::ModuleNotFound {
                name: name.to_string(),
                module: key.to_string(),
            })?;

        let previous = self.adapters.remove(name);
        (module.register)(self, name);

        if !self.adapters.contains_key(name) {
            if let Some(previous) = previous {
                self.adapters.insert(name.to_string(), previous);
            }
            return Err(AdapterLoadError::NotRegistered {
                name: name.to_string(),
                module: key.to_string(),
            });
        }
        Ok(())
    }

    /// 全ての名前を読み込み、失敗したものを返す (1つの失敗で止めない)
    pub fn load_all<'a>(
        &mut self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Vec<(String, AdapterLoadError)> {
        let mut failures = Vec::new();
        for name in names {
            if let Err(e) = self.load_by_name(name) {
                error!(adapter = name, "Error loading adapter: {}", e);
                failures.push((name.to_string(), e));
            }
        }
        failures
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn module_key(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}
