//! 实例聚合器
//!
//! 扫描一个骨骼实例上的全部 Spring Bone 设置，构建：
//! - 连续的节点列表（DFS 先序，保证索引映射确定）
//! - 按指针去重的碰撞体组列表
//! - 需要每帧刷新矩阵的 Center 骨骼列表

use std::sync::Arc;

use glam::Vec3;

use crate::skeleton::{BoneFlags, BoneSet, SharedSkeleton};
use crate::{Result, SpringBoneError};

use super::collider::ColliderGroup;
use super::config::SpringBoneConfig;
use super::node::{BindPose, CenterMatrix, NodeParams, NodeState, SpringNode};

/// 骨骼长度低于该值时按叶骨骼处理
const MIN_BONE_LENGTH: f32 = 1e-6;

// ============================================================================
// Spring Bone 设置
// ============================================================================

/// 一组 Spring Bone 链的设置（挂在骨骼上，由宿主填写）
#[derive(Clone, Debug)]
pub struct SpringBoneSettings {
    pub name: String,
    /// 链根骨骼；每个根及其全部子孙都成为节点
    pub roots: Vec<usize>,
    pub stiffness: f32,
    pub drag: f32,
    pub gravity_dir: Vec3,
    pub gravity_power: f32,
    pub hit_radius: f32,
    /// Center 骨骼，None 表示在世界空间模拟
    pub center: Option<usize>,
    pub collider_groups: Vec<Arc<ColliderGroup>>,
}

impl SpringBoneSettings {
    pub fn new(name: impl Into<String>) -> Self {
        let defaults = NodeParams::default();
        Self {
            name: name.into(),
            roots: Vec::new(),
            stiffness: defaults.stiffness,
            drag: defaults.drag,
            gravity_dir: defaults.gravity_dir,
            gravity_power: defaults.gravity_power,
            hit_radius: defaults.hit_radius,
            center: None,
            collider_groups: Vec::new(),
        }
    }

    pub fn with_roots(mut self, roots: impl IntoIterator<Item = usize>) -> Self {
        self.roots.extend(roots);
        self
    }

    pub fn with_collider_group(mut self, group: Arc<ColliderGroup>) -> Self {
        self.collider_groups.push(group);
        self
    }

    #[inline]
    pub fn node_params(&self) -> NodeParams {
        NodeParams {
            stiffness: self.stiffness,
            drag: self.drag,
            gravity_dir: self.gravity_dir,
            gravity_power: self.gravity_power,
            hit_radius: self.hit_radius,
        }
    }

    fn validate(&self, bone_count: usize) -> Result<()> {
        let invalid = self
            .roots
            .iter()
            .copied()
            .chain(self.center)
            .find(|&bone| bone >= bone_count);
        match invalid {
            Some(bone) => Err(SpringBoneError::InvalidBone {
                settings: self.name.clone(),
                bone,
                bone_count,
            }),
            None => Ok(()),
        }
    }
}

// ============================================================================
// 实例
// ============================================================================

/// 单个骨骼实例的 Spring Bone 聚合
#[derive(Debug)]
pub struct SpringBoneInstance {
    skeleton: SharedSkeleton,
    nodes: Vec<SpringNode>,
    collider_groups: Vec<Arc<ColliderGroup>>,
    /// Center 骨骼（节点的 center 槽位即此列表索引）
    centers: Vec<usize>,
    initialized: bool,
}

impl SpringBoneInstance {
    pub fn new(skeleton: SharedSkeleton) -> Self {
        Self {
            skeleton,
            nodes: Vec::new(),
            collider_groups: Vec::new(),
            centers: Vec::new(),
            initialized: false,
        }
    }

    /// 扫描骨骼构建节点、碰撞体组与 Center 列表（重复调用无副作用）
    ///
    /// 以骨骼当前世界姿态作为静止姿态。
    pub fn initialize(&mut self, config: &SpringBoneConfig) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        let skeleton = Arc::clone(&self.skeleton);
        let mut bones = skeleton.write().unwrap_or_else(|e| e.into_inner());
        let bone_count = bones.len();
        for settings in bones.springs() {
            settings.validate(bone_count)?;
        }

        let mut claimed = vec![false; bone_count];
        let mut flags: Vec<(usize, BoneFlags)> = Vec::new();
        let mut stack: Vec<usize> = Vec::new();

        for settings in bones.springs() {
            let groups: Vec<u32> = settings
                .collider_groups
                .iter()
                .map(|group| self.intern_group(group, bone_count, &mut flags))
                .collect();

            let center = settings.center.map(|bone| {
                let slot = match self.centers.iter().position(|&c| c == bone) {
                    Some(slot) => slot,
                    None => {
                        self.centers.push(bone);
                        flags.push((bone, BoneFlags::CENTER));
                        self.centers.len() - 1
                    }
                };
                (slot as u32, CenterMatrix::from_world(bones.world_matrix(bone)))
            });

            let params = settings.node_params();
            for &root in &settings.roots {
                stack.clear();
                stack.push(root);
                while let Some(bone) = stack.pop() {
                    stack.extend(bones.children(bone).iter().rev());
                    if claimed[bone] {
                        log::warn!(
                            "[SpringBone] 骨骼 {} 已被其他链驱动，'{}' 跳过该节点",
                            bone, settings.name
                        );
                        continue;
                    }
                    claimed[bone] = true;
                    flags.push((bone, BoneFlags::SPRING));
                    self.nodes.push(Self::build_node(
                        &bones,
                        bone,
                        params,
                        center,
                        groups.clone(),
                        config.leaf_tail_length,
                    ));
                }
            }
        }

        for (bone, flag) in flags {
            bones.insert_flags(bone, flag);
        }
        self.initialized = true;

        if config.debug_log {
            log::debug!(
                "[SpringBone] 实例初始化: {} 节点, {} 碰撞体组, {} Center",
                self.nodes.len(),
                self.collider_groups.len(),
                self.centers.len()
            );
        }
        Ok(())
    }

    /// 按指针去重登记碰撞体组，返回实例内组索引
    fn intern_group(
        &mut self,
        group: &Arc<ColliderGroup>,
        bone_count: usize,
        flags: &mut Vec<(usize, BoneFlags)>,
    ) -> u32 {
        if let Some(index) = self.collider_groups.iter().position(|g| Arc::ptr_eq(g, group)) {
            return index as u32;
        }
        if group.bone() < bone_count {
            flags.push((group.bone(), BoneFlags::COLLIDER));
        } else {
            log::warn!(
                "[SpringBone] 碰撞体组 '{}' 挂载的骨骼 {} 不存在，视为无碰撞",
                group.name(), group.bone()
            );
        }
        self.collider_groups.push(Arc::clone(group));
        (self.collider_groups.len() - 1) as u32
    }

    /// 以第一个子骨骼为尾端；叶骨骼沿 父→自身 方向延伸虚拟尾端
    fn build_node(
        bones: &BoneSet,
        bone: usize,
        params: NodeParams,
        center: Option<(u32, CenterMatrix)>,
        groups: Vec<u32>,
        leaf_tail_length: f32,
    ) -> SpringNode {
        let link = &bones.bones()[bone];
        let head = link.position();
        let head_rotation = link.world_rotation();

        let child_tail = bones
            .children(bone)
            .first()
            .map(|&child| bones.world_position(child))
            .filter(|tail| (*tail - head).length_squared() > MIN_BONE_LENGTH * MIN_BONE_LENGTH);

        let tail = child_tail.unwrap_or_else(|| {
            let from_parent = link.parent_id().map_or(Vec3::ZERO, |p| head - bones.world_position(p));
            let dir = from_parent.normalize_or(head_rotation * Vec3::Y);
            head + dir * leaf_tail_length
        });

        let pose = BindPose {
            local_rotation: link.rotation,
            head,
            head_rotation,
            tail,
        };
        SpringNode::new(bone, link.parent_id(), pose, params, center, groups)
    }

    /// 释放全部引用（未初始化时为空操作）
    pub fn dispose(&mut self) {
        if !self.initialized {
            return;
        }
        self.nodes = Vec::new();
        self.collider_groups = Vec::new();
        self.centers = Vec::new();
        self.initialized = false;
    }

    /// 恢复节点骨骼的初始本地旋转与尾端状态
    pub fn reset(&mut self) {
        let mut bones = self.skeleton.write().unwrap_or_else(|e| e.into_inner());
        for node in &mut self.nodes {
            node.reset();
            if let Some(link) = bones.bone(node.bone) {
                let rotation = link.initial.rotation;
                bones.set_local_rotation(node.bone, rotation);
            }
        }
        bones.update_world_transforms();
    }

    // ========================================
    // 访问器
    // ========================================

    #[inline]
    pub fn skeleton(&self) -> &SharedSkeleton {
        &self.skeleton
    }

    #[inline]
    pub fn nodes(&self) -> &[SpringNode] {
        &self.nodes
    }

    #[inline]
    pub fn collider_groups(&self) -> &[Arc<ColliderGroup>] {
        &self.collider_groups
    }

    #[inline]
    pub fn centers(&self) -> &[usize] {
        &self.centers
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// 调度器在重建前把模拟状态写回实例
    pub(crate) fn store_states(&mut self, states: &[NodeState]) {
        for (node, state) in self.nodes.iter_mut().zip(states) {
            node.state = *state;
        }
    }
}
