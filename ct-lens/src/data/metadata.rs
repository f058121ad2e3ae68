//! 与格式相关的图像元信息.
//!
//! 可选字段缺失时存储显式的哨兵值 (如 `"Unknown"` 或 `0`), 而不是让解码失败.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::consts::UNKNOWN;

/// 单个元信息的值.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    /// 文本, 如患者 ID, 模态.
    Text(String),

    /// 单个数值, 如层厚.
    Number(f64),

    /// 数值序列, 如像素间距, 体素尺寸.
    Numbers(Vec<f64>),

    /// 数组形状.
    Shape(Vec<usize>),

    /// 行优先的 4x4 矩阵, 如 NIfTI 仿射变换.
    Matrix([[f64; 4]; 4]),

    /// 文件中没有该字段, 且没有约定的默认值.
    Unknown,
}

impl MetaValue {
    /// 文本哨兵 `"Unknown"`.
    #[inline]
    pub fn unknown_text() -> Self {
        Self::Text(UNKNOWN.to_string())
    }

    /// 获取文本值.
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// 获取数值.
    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// 获取数值序列.
    #[inline]
    pub fn as_numbers(&self) -> Option<&[f64]> {
        match self {
            Self::Numbers(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// 是否为哨兵值.
    pub fn is_unknown(&self) -> bool {
        match self {
            Self::Unknown => true,
            Self::Text(s) => s == UNKNOWN,
            _ => false,
        }
    }
}

impl From<&str> for MetaValue {
    #[inline]
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetaValue {
    #[inline]
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for MetaValue {
    #[inline]
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<Vec<f64>> for MetaValue {
    #[inline]
    fn from(value: Vec<f64>) -> Self {
        Self::Numbers(value)
    }
}

/// 有序的元信息映射 `键 -> 值`.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata(BTreeMap<String, MetaValue>);

impl Metadata {
    /// 空映射.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入 `key`. 已存在时覆盖.
    #[inline]
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// 写入 `key`; `value` 为 `None` 时写入 `fallback`.
    #[inline]
    pub fn insert_or(&mut self, key: &str, value: Option<MetaValue>, fallback: MetaValue) {
        self.0.insert(key.to_string(), value.unwrap_or(fallback));
    }

    /// 读取 `key`.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.0.get(key)
    }

    /// 读取文本. 键不存在或不是文本时返回 `None`.
    #[inline]
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MetaValue::as_text)
    }

    /// 读取数值. 键不存在或不是数值时返回 `None`.
    #[inline]
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(MetaValue::as_number)
    }

    /// 条目个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 按键的字典序迭代.
    #[inline]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &MetaValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}
