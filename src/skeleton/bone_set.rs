//! 骨骼集合 - 管理骨骼层次结构
//!
//! 约定：父骨骼总是先于子骨骼加入，因此按索引顺序遍历即为父先子后，
//! 更新世界矩阵无需额外排序。

use std::sync::{Arc, RwLock};

use glam::{Mat4, Quat, Vec3};

use crate::physics::SpringBoneSettings;
use crate::{Result, SpringBoneError};

use super::{BoneLink, BoneTransform, SharedSkeleton};

/// 骨骼集合
#[derive(Clone, Debug, Default)]
pub struct BoneSet {
    bones: Vec<BoneLink>,
    /// 子骨骼缓存
    children: Vec<Vec<usize>>,
    /// 挂在此骨骼上的 Spring Bone 设置
    springs: Vec<SpringBoneSettings>,
}

impl BoneSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加骨骼，返回骨骼索引
    ///
    /// 父骨骼必须已存在。
    pub fn add_bone(
        &mut self,
        name: impl Into<String>,
        parent: Option<usize>,
        transform: BoneTransform,
    ) -> Result<usize> {
        let name = name.into();
        let index = self.bones.len();
        if let Some(parent) = parent {
            if parent >= index {
                return Err(SpringBoneError::InvalidParent { bone: name, parent });
            }
        }

        let mut bone = BoneLink::with_transform(name, transform);
        bone.parent_index = parent.map_or(-1, |p| p as i32);

        let parent_world = match parent {
            Some(p) => {
                self.children[p].push(index);
                self.bones[p].local_to_world
            }
            None => Mat4::IDENTITY,
        };
        bone.local_to_world = parent_world * bone.local_to_parent;

        self.bones.push(bone);
        self.children.push(Vec::new());
        Ok(index)
    }

    /// 添加 Spring Bone 设置
    pub fn add_spring(&mut self, settings: SpringBoneSettings) {
        self.springs.push(settings);
    }

    /// 转为共享句柄
    pub fn into_shared(self) -> SharedSkeleton {
        Arc::new(RwLock::new(self))
    }

    // ========================================
    // 访问器
    // ========================================

    #[inline]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    #[inline]
    pub fn bone(&self, index: usize) -> Option<&BoneLink> {
        self.bones.get(index)
    }

    #[inline]
    pub fn bones(&self) -> &[BoneLink] {
        &self.bones
    }

    #[inline]
    pub fn children(&self, index: usize) -> &[usize] {
        self.children.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    #[inline]
    pub fn springs(&self) -> &[SpringBoneSettings] {
        &self.springs
    }

    /// 世界位置（越界返回原点）
    #[inline]
    pub fn world_position(&self, index: usize) -> Vec3 {
        self.bones.get(index).map_or(Vec3::ZERO, BoneLink::position)
    }

    /// 世界旋转（越界返回单位旋转）
    #[inline]
    pub fn world_rotation(&self, index: usize) -> Quat {
        self.bones.get(index).map_or(Quat::IDENTITY, BoneLink::world_rotation)
    }

    /// 世界矩阵（越界返回单位矩阵）
    #[inline]
    pub fn world_matrix(&self, index: usize) -> Mat4 {
        self.bones.get(index).map_or(Mat4::IDENTITY, |b| b.local_to_world)
    }

    // ========================================
    // 变换写入
    // ========================================

    /// 设置本地旋转（不刷新世界矩阵）
    pub fn set_local_rotation(&mut self, index: usize, rotation: Quat) {
        if let Some(bone) = self.bones.get_mut(index) {
            bone.rotation = rotation;
            bone.compute_local_transform();
        }
    }

    /// 设置本地平移（不刷新世界矩阵）
    pub fn set_local_translation(&mut self, index: usize, translation: Vec3) {
        if let Some(bone) = self.bones.get_mut(index) {
            bone.translation = translation;
            bone.compute_local_transform();
        }
    }

    /// 按父先子后顺序刷新全部世界矩阵
    pub fn update_world_transforms(&mut self) {
        for idx in 0..self.bones.len() {
            let parent_world = match self.bones[idx].parent_id() {
                Some(p) => self.bones[p].local_to_world,
                None => Mat4::IDENTITY,
            };
            self.bones[idx].local_to_world = parent_world * self.bones[idx].local_to_parent;
        }
    }

    /// 递归刷新某骨骼及其子孙的世界矩阵（父骨骼世界矩阵须已是最新）
    pub fn update_world_transform_recursive(&mut self, idx: usize) {
        if idx >= self.bones.len() {
            return;
        }
        let parent_world = match self.bones[idx].parent_id() {
            Some(p) => self.bones[p].local_to_world,
            None => Mat4::IDENTITY,
        };
        self.bones[idx].local_to_world = parent_world * self.bones[idx].local_to_parent;

        for i in 0..self.children[idx].len() {
            let child = self.children[idx][i];
            self.update_world_transform_recursive(child);
        }
    }

    /// 修改骨骼标志（聚合器初始化时调用）
    pub(crate) fn insert_flags(&mut self, index: usize, flags: super::BoneFlags) {
        if let Some(bone) = self.bones.get_mut(index) {
            bone.flags.insert(flags);
        }
    }
}
