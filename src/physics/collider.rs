//! 球形碰撞体与碰撞体组
//!
//! 碰撞体组构建后不可变，通过 `Arc` 被多个节点共享；
//! 同一实例内按指针判重，只存储一次。

use std::ops::Range;

use glam::{Mat4, Vec3};

/// 球形碰撞体（骨骼本地空间）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphereCollider {
    /// 相对所挂骨骼的本地偏移
    pub offset: Vec3,
    /// 半径
    pub radius: f32,
}

impl SphereCollider {
    pub fn new(offset: Vec3, radius: f32) -> Self {
        Self { offset, radius }
    }
}

/// 世界空间中的球（碰撞哈希阶段的输出）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl WorldSphere {
    pub const ZERO: Self = Self { center: Vec3::ZERO, radius: 0.0 };
}

/// 碰撞体组：挂在一根骨骼上的一组球
#[derive(Clone, Debug)]
pub struct ColliderGroup {
    name: String,
    bone: usize,
    spheres: Vec<SphereCollider>,
}

impl ColliderGroup {
    pub fn new(name: impl Into<String>, bone: usize, spheres: Vec<SphereCollider>) -> Self {
        Self {
            name: name.into(),
            bone,
            spheres,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 所挂骨骼索引
    #[inline]
    pub fn bone(&self) -> usize {
        self.bone
    }

    #[inline]
    pub fn spheres(&self) -> &[SphereCollider] {
        &self.spheres
    }

    /// 用骨骼世界矩阵把本地球变换到世界空间
    ///
    /// 半径按矩阵最大轴缩放放大。
    pub fn transform_into(&self, world: Mat4, out: &mut [WorldSphere]) {
        let (scale, _, _) = world.to_scale_rotation_translation();
        let radius_scale = scale.abs().max_element();
        for (dst, sphere) in out.iter_mut().zip(&self.spheres) {
            *dst = WorldSphere {
                center: world.transform_point3(sphere.offset),
                radius: sphere.radius * radius_scale,
            };
        }
    }
}

// ============================================================================
// 按组索引的碰撞查找表
// ============================================================================

/// 碰撞查找表：组索引 → 该组世界空间球的连续区间
///
/// 区间在重建时确定，每帧只覆写球的数据，不做分配。
#[derive(Clone, Debug, Default)]
pub struct ColliderLookup {
    spheres: Vec<WorldSphere>,
    ranges: Vec<Range<usize>>,
}

impl ColliderLookup {
    /// 按每组球数预分配
    pub fn with_group_sizes(sizes: impl IntoIterator<Item = usize>) -> Self {
        let mut ranges = Vec::new();
        let mut total = 0;
        for size in sizes {
            ranges.push(total..total + size);
            total += size;
        }
        Self {
            spheres: vec![WorldSphere::ZERO; total],
            ranges,
        }
    }

    /// 某组的全部球；未知组返回空切片（不产生碰撞约束）
    #[inline]
    pub fn group(&self, group: usize) -> &[WorldSphere] {
        match self.ranges.get(group) {
            Some(range) => &self.spheres[range.clone()],
            None => &[],
        }
    }

    #[inline]
    pub fn group_count(&self) -> usize {
        self.ranges.len()
    }

    #[inline]
    pub fn sphere_count(&self) -> usize {
        self.spheres.len()
    }

    #[inline]
    pub fn spheres(&self) -> &[WorldSphere] {
        &self.spheres
    }

    /// 同时取得区间表与可写球缓冲（阶段 1 按组切分写入）
    #[inline]
    pub(crate) fn split_mut(&mut self) -> (&[Range<usize>], &mut [WorldSphere]) {
        (&self.ranges, &mut self.spheres)
    }
}
