//! 面对面连接
//!
//! 连接是静态的有向边：基础积木（base）的某个面与附加积木（add）的某个面贴合。
//! 端点（end）描述附加积木沿另一根轴与基础积木的哪一端对齐。

use crate::block::BlockId;
use crate::math::{Axis, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 积木的面
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Face {
    pub axis: Axis,
    pub positive: bool,
}

impl Face {
    pub fn new(axis: Axis, positive: bool) -> Self {
        Self { axis, positive }
    }

    pub fn sign(&self) -> f64 {
        if self.positive {
            1.0
        } else {
            -1.0
        }
    }

    /// 外法向
    pub fn normal(&self) -> Vector3 {
        self.axis.unit() * self.sign()
    }

    pub fn opposite(&self) -> Face {
        Face::new(self.axis, !self.positive)
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", if self.positive { '+' } else { '-' }, self.axis)
    }
}

impl FromStr for Face {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let positive = match s.chars().next() {
            Some('+') => true,
            Some('-') => false,
            _ => return Err(format!("Invalid face: {}", s)),
        };
        let axis = s[1..]
            .parse::<Axis>()
            .map_err(|_| format!("Invalid face: {}", s))?;
        Ok(Face::new(axis, positive))
    }
}

impl TryFrom<String> for Face {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Face> for String {
    fn from(face: Face) -> Self {
        face.to_string()
    }
}

/// 连接端点：居中（"0"）或朝向某个面的一端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum End {
    #[default]
    Center,
    Toward(Face),
}

impl fmt::Display for End {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            End::Center => f.write_str("0"),
            End::Toward(face) => face.fmt(f),
        }
    }
}

impl FromStr for End {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0" | "" => Ok(End::Center),
            other => other
                .parse::<Face>()
                .map(End::Toward)
                .map_err(|_| format!("Invalid end: {}", s)),
        }
    }
}

impl TryFrom<String> for End {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<End> for String {
    fn from(end: End) -> Self {
        end.to_string()
    }
}

/// 已解析的连接
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub base: BlockId,
    pub base_face: Face,
    pub base_end: End,
    pub add: BlockId,
    pub add_face: Face,
    pub add_end: End,
}

/// 按名称描述的连接（加载时解析为 [`Connection`]）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSpec {
    pub base_block: String,
    pub base_block_face: Face,
    #[serde(default)]
    pub base_block_end: End,
    pub add_block: String,
    pub add_block_face: Face,
    #[serde(default)]
    pub add_block_end: End,
}

impl ConnectionSpec {
    /// 以居中端点创建连接
    pub fn new(base: impl Into<String>, base_face: Face, add: impl Into<String>, add_face: Face) -> Self {
        Self {
            base_block: base.into(),
            base_block_face: base_face,
            base_block_end: End::Center,
            add_block: add.into(),
            add_block_face: add_face,
            add_block_end: End::Center,
        }
    }

    pub fn with_ends(mut self, base_end: End, add_end: End) -> Self {
        self.base_block_end = base_end;
        self.add_block_end = add_end;
        self
    }
}
