//! 面对面装配放置
//!
//! 没有显式位置的积木通过连接从已放置的积木推导位置：
//! - 附加积木沿基础面的法向推出，使两个面贴合
//! - 端点不是 "0" 时，附加积木在该轴上与基础积木的对应一端齐平
//!
//! 放置是双向的：既可以从基础积木放置附加积木，也可以反推基础积木。

use crate::block::{Block, BlockId};
use crate::connection::{Connection, End};
use crate::math::Point3;

/// 由已放置的基础积木计算附加积木的中心
pub fn place_add_from_base(base: &Block, add: &Block, conn: &Connection) -> Point3 {
    let hb = base.half_extents();
    let ha = add.half_extents();
    let face = conn.base_face;
    let axis = face.axis.index();

    let mut position = base.position;
    position[axis] += face.sign() * (hb[axis] + ha[axis]);

    if let End::Toward(end) = conn.base_end {
        let i = end.axis.index();
        if i != axis {
            position[i] = base.position[i] + end.sign() * (hb[i] - ha[i]);
        }
    }
    if let End::Toward(end) = conn.add_end {
        let i = end.axis.index();
        if i != axis {
            position[i] = base.position[i] + end.sign() * (ha[i] - hb[i]);
        }
    }
    position
}

/// 由已放置的附加积木反推基础积木的中心
pub fn place_base_from_add(base: &Block, add: &Block, conn: &Connection) -> Point3 {
    let hb = base.half_extents();
    let ha = add.half_extents();
    let face = conn.base_face;
    let axis = face.axis.index();

    let mut position = add.position;
    position[axis] -= face.sign() * (hb[axis] + ha[axis]);

    if let End::Toward(end) = conn.base_end {
        let i = end.axis.index();
        if i != axis {
            position[i] = add.position[i] - end.sign() * (hb[i] - ha[i]);
        }
    }
    if let End::Toward(end) = conn.add_end {
        let i = end.axis.index();
        if i != axis {
            position[i] = add.position[i] - end.sign() * (ha[i] - hb[i]);
        }
    }
    position
}

/// 放置所有未显式定位的积木
///
/// `placed[i]` 表示第 i 个积木的位置已确定。没有任何已放置积木时，
/// 第一个底座积木固定在原点作为起点。
pub fn assemble(blocks: &mut [Block], connections: &[Connection], mut placed: Vec<bool>) {
    if blocks.is_empty() {
        return;
    }
    if !placed.iter().any(|p| *p) {
        let anchor = blocks.iter().position(|b| b.base_block).unwrap_or(0);
        placed[anchor] = true;
    }

    loop {
        let mut progress = false;
        for conn in connections {
            let (BlockId(base), BlockId(add)) = (conn.base, conn.add);
            match (placed[base], placed[add]) {
                (true, false) => {
                    blocks[add].position = place_add_from_base(&blocks[base], &blocks[add], conn);
                    placed[add] = true;
                    progress = true;
                }
                (false, true) => {
                    blocks[base].position = place_base_from_add(&blocks[base], &blocks[add], conn);
                    placed[base] = true;
                    progress = true;
                }
                _ => {}
            }
        }
        if !progress {
            break;
        }
    }

    for (block, is_placed) in blocks.iter().zip(&placed) {
        if !is_placed {
            tracing::warn!("Block '{}' could not be placed from connections; left at origin", block.name);
        }
    }
}
