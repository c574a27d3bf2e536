//! 连接解析器与运动学树
//!
//! 从无序的连接列表构建以末端积木（通常是工具）为根的森林：
//! - 节点的子节点是它所安装在其上的基础积木，向机器底座方向延伸
//! - 同一个附加积木解析出多个基础积木时，它们互为并联兄弟
//! - 安装在主路径节点上、但不在底座→工具路径上的积木作为孤儿节点随之刚性移动
//!
//! 构建分两遍：先按父/子分组连接，再用显式 visited 集合做迭代深度优先遍历。

use crate::block::{Block, BlockId};
use crate::connection::Connection;
use crate::error::ConfigurationError;
use std::collections::{HashMap, HashSet};

/// 节点ID（森林内的索引）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// 运动学节点
#[derive(Debug, Clone)]
pub struct KinematicNode {
    pub block: BlockId,
    /// 父节点（朝向根，即朝向工具）
    pub parent: Option<NodeId>,
    /// 本积木安装在其上的基础积木
    pub children: Vec<NodeId>,
    /// 与本节点驱动同一个附加积木的其他基础积木（仅供参考，不参与位移遍历）
    pub parallels: Vec<NodeId>,
    /// 刚性随动的孤儿节点
    pub orphans: Vec<NodeId>,
    pub is_orphan: bool,
}

impl KinematicNode {
    fn new(block: BlockId, parent: Option<NodeId>, is_orphan: bool) -> Self {
        Self {
            block,
            parent,
            children: Vec::new(),
            parallels: Vec::new(),
            orphans: Vec::new(),
            is_orphan,
        }
    }
}

/// 运动学森林：每条独立的末端执行器链一棵树
#[derive(Debug, Clone, Default)]
pub struct KinematicForest {
    nodes: Vec<KinematicNode>,
    roots: Vec<NodeId>,
    by_block: HashMap<BlockId, NodeId>,
}

impl KinematicForest {
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> &KinematicNode {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &KinematicNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 查找积木所在的节点
    pub fn node_of(&self, block: BlockId) -> Option<NodeId> {
        self.by_block.get(&block).copied()
    }

    pub fn contains(&self, block: BlockId) -> bool {
        self.by_block.contains_key(&block)
    }

    /// 从节点到根的路径（包含两端）
    pub fn path_to_root(&self, from: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current = Some(from);
        while let Some(id) = current {
            path.push(id);
            current = self.nodes[id.0].parent;
        }
        path
    }

    pub fn orphans(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].orphans
    }

    pub fn parallels(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].parallels
    }

    pub fn root_of(&self, node: NodeId) -> NodeId {
        let mut current = node;
        while let Some(parent) = self.nodes[current.0].parent {
            current = parent;
        }
        current
    }

    /// 节点移动时一起移动的积木：路径上每个节点自身及其孤儿
    pub fn co_moving_blocks(&self, from: NodeId) -> Vec<BlockId> {
        let mut blocks = Vec::new();
        for id in self.path_to_root(from) {
            let node = &self.nodes[id.0];
            blocks.push(node.block);
            blocks.extend(node.orphans.iter().map(|o| self.nodes[o.0].block));
        }
        blocks
    }

    fn push(&mut self, node: KinematicNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.by_block.insert(node.block, id);
        self.nodes.push(node);
        id
    }
}

/// 从积木与连接构建运动学森林
pub fn build_tree(
    blocks: &[Block],
    connections: &[Connection],
) -> Result<KinematicForest, ConfigurationError> {
    // 第一遍：按附加积木和基础积木分组
    let mut bases_of: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
    let mut adds_of: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
    for conn in connections {
        let bases = bases_of.entry(conn.add).or_default();
        if !bases.contains(&conn.base) {
            bases.push(conn.base);
        }
        let adds = adds_of.entry(conn.base).or_default();
        if !adds.contains(&conn.add) {
            adds.push(conn.add);
        }
    }

    let root_candidates: Vec<BlockId> = blocks
        .iter()
        .filter(|b| b.end_block)
        .map(|b| b.id)
        .collect();
    if root_candidates.is_empty() {
        return Err(ConfigurationError::MissingTool);
    }

    let end_blocks: HashSet<BlockId> = root_candidates.iter().copied().collect();
    let mut forest = KinematicForest::default();
    let mut visited: HashSet<BlockId> = HashSet::new();

    // 第二遍：每个根候选的主路径
    for candidate in root_candidates {
        visited.insert(candidate);
        let root = forest.push(KinematicNode::new(candidate, None, false));
        forest.roots.push(root);

        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            let block = forest.nodes[current.0].block;
            let bases = bases_of.get(&block).map(Vec::as_slice).unwrap_or_default();
            // 末端积木只能作为根，不能出现在其他链上
            if let Some(end) = bases.iter().find(|b| end_blocks.contains(*b)) {
                let name = blocks
                    .iter()
                    .find(|b| b.id == *end)
                    .map(|b| b.name.clone())
                    .unwrap_or_else(|| end.to_string());
                return Err(ConfigurationError::EndBlockInChain(name));
            }
            let resolved: Vec<BlockId> = bases.iter().copied().filter(|b| visited.insert(*b)).collect();

            let children: Vec<NodeId> = resolved
                .into_iter()
                .map(|base| forest.push(KinematicNode::new(base, Some(current), false)))
                .collect();

            if children.len() > 1 {
                for &child in &children {
                    forest.nodes[child.0].parallels =
                        children.iter().copied().filter(|c| *c != child).collect();
                }
            }

            forest.nodes[current.0].children.extend(children.iter().copied());
            stack.extend(children.into_iter().rev());
        }
    }

    // 孤儿：主路径节点上挂着、但未被主遍历访问的附加积木
    let main_nodes = forest.nodes.len();
    for index in 0..main_nodes {
        let owner = NodeId(index);
        let block = forest.nodes[index].block;
        let Some(adds) = adds_of.get(&block) else {
            continue;
        };
        for &add in adds {
            if visited.insert(add) {
                let orphan = forest.push(KinematicNode::new(add, Some(owner), true));
                forest.nodes[index].orphans.push(orphan);
            }
        }
    }

    let unreachable: Vec<&str> = blocks
        .iter()
        .filter(|b| !visited.contains(&b.id))
        .map(|b| b.name.as_str())
        .collect();
    if !unreachable.is_empty() {
        tracing::debug!("Blocks outside the kinematic forest: {:?}", unreachable);
    }

    tracing::debug!(
        "Built kinematic forest: {} roots, {} nodes",
        forest.roots.len(),
        forest.nodes.len()
    );

    Ok(forest)
}
