//! `ConfigMap` — the typed key → list-of-string configuration container
//! the builder uses to wire components together.
//!
//! # 设计背景（Why）
//! - 每个组件（观测器、预测器、负载估计器）只需要知道键名与值的形状，而不需要知道
//!   配置来自文件、命令行参数还是被其他文件 `importConfig` 进来的——因此容器本身
//!   只关心“键 -> 有序字符串列表”，类型化访问器在读取时才做解释与校验。
//!
//! # 契约说明（What）
//! - 文本格式：`#`/`/` 开头或空行是注释；每个非注释行是 `key : v1, v2, …`；键与值
//!   两侧空白会被裁剪；逗号之间的空值会被跳过。
//! - `importConfig : a, b` 会按搜索路径递归解析并导入 `a`、`b`；后导入的键覆盖先
//!   导入的同名键（参见 `spec.md` §8 场景 6 与 `DESIGN.md` 中记录的与原始实现的
//!   有意偏离）。
use crate::error::ProgError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A typed key → ordered-list-of-strings configuration container.
#[derive(Debug, Clone, Default)]
pub struct ConfigMap {
    values: HashMap<String, Vec<String>>,
    search_paths: Vec<PathBuf>,
}

impl ConfigMap {
    pub fn new() -> Self {
        ConfigMap::default()
    }

    /// Registers `path` as a directory to resolve `importConfig` entries
    /// against. Fails if `path` does not exist or is not a directory.
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) -> Result<(), ProgError> {
        let path = path.into();
        if !path.is_dir() {
            return Err(ProgError::config_missing(format!(
                "search path {} is not a directory",
                path.display()
            )));
        }
        self.search_paths.push(path);
        Ok(())
    }

    /// Sets `key`'s value list directly, replacing any existing binding.
    pub fn set(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.values.insert(key.into(), values);
    }

    /// Parses `text` as a config file body (see module docs for the
    /// format) and merges it into `self`, resolving any `importConfig`
    /// entries it contains. Later bindings (later lines, later imports)
    /// win over earlier ones for the same key.
    pub fn parse(&mut self, text: &str) -> Result<(), ProgError> {
        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('/') {
                continue;
            }
            let Some((key, rest)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_string();
            let values: Vec<String> = rest
                .split(',')
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(|v| v.to_string())
                .collect();

            if key == "importConfig" {
                for target in values {
                    self.import(&target)?;
                }
                continue;
            }
            self.values.insert(key, values);
        }
        Ok(())
    }

    /// Loads and merges `name`, resolved against the registered search
    /// paths (or the current directory if none are registered or none
    /// contain `name`).
    pub fn import(&mut self, name: &str) -> Result<(), ProgError> {
        let path = self.resolve(name)?;
        let text = std::fs::read_to_string(&path).map_err(|e| {
            ProgError::config_missing_with_source(format!("could not read {}", path.display()), e)
        })?;
        self.parse(&text)
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, ProgError> {
        let direct = Path::new(name);
        if direct.is_file() {
            return Ok(direct.to_path_buf());
        }
        for base in &self.search_paths {
            let candidate = base.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        Err(ProgError::config_missing(format!(
            "could not resolve import {name} against any search path"
        )))
    }

    /// Parses `args` the way a command line is parsed: a bare `-KEY
    /// VALUE` pair sets `KEY` to a one-element list; a run of values with
    /// no preceding `-KEY` accumulates under `NO_KEY`.
    pub fn load_arguments(&mut self, args: impl IntoIterator<Item = String>) {
        let mut pending_key: Option<String> = None;
        let mut stray = Vec::new();
        for arg in args {
            if let Some(key) = arg.strip_prefix('-') {
                if let Some(prev) = pending_key.take() {
                    self.values.entry(prev).or_default();
                }
                pending_key = Some(key.to_string());
            } else if let Some(key) = pending_key.take() {
                self.values.insert(key, vec![arg]);
            } else {
                stray.push(arg);
            }
        }
        if let Some(key) = pending_key {
            self.values.entry(key).or_default();
        }
        if !stray.is_empty() {
            self.values.entry("NO_KEY".to_string()).or_default().extend(stray);
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_vec(&self, key: &str) -> Result<&[String], ProgError> {
        self.values
            .get(key)
            .map(Vec::as_slice)
            .ok_or_else(|| ProgError::config_missing(format!("missing key {key}")))
    }

    pub fn get_string(&self, key: &str) -> Result<&str, ProgError> {
        let values = self.get_vec(key)?;
        match values {
            [single] => Ok(single.as_str()),
            _ => Err(ProgError::config_missing(format!(
                "key {key} expected exactly one value, found {}",
                values.len()
            ))),
        }
    }

    pub fn get_u64(&self, key: &str) -> Result<u64, ProgError> {
        self.get_string(key)?
            .parse()
            .map_err(|_| ProgError::config_missing(format!("key {key} is not a valid u64")))
    }

    pub fn get_double(&self, key: &str) -> Result<f64, ProgError> {
        self.get_string(key)?
            .parse()
            .map_err(|_| ProgError::config_missing(format!("key {key} is not a valid f64")))
    }

    pub fn get_double_vector(&self, key: &str) -> Result<Vec<f64>, ProgError> {
        self.get_vec(key)?
            .iter()
            .map(|v| {
                v.parse()
                    .map_err(|_| ProgError::config_missing(format!("key {key} has a non-numeric entry")))
            })
            .collect()
    }

    /// `get_double_vector`, but fails unless the list has exactly
    /// `expected_len` entries — used for fixed-shape matrices like
    /// `Observer.Q`/`Observer.R`.
    pub fn get_double_vector_sized(&self, key: &str, expected_len: usize) -> Result<Vec<f64>, ProgError> {
        let values = self.get_double_vector(key)?;
        if values.len() != expected_len {
            return Err(ProgError::config_missing(format!(
                "key {key} expected {expected_len} values, found {}",
                values.len()
            )));
        }
        Ok(values)
    }
}
