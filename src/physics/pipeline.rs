//! 三阶段作业管线
//!
//! 1. 碰撞哈希：按组把本地球变换到世界空间，写入按组索引的查找表
//! 2. 父旋转快照：把每个节点父骨骼的世界旋转（及自身位置）拷到节点对齐数组
//! 3. 积分与求解：依赖 1、2 的汇合，逐节点求新尾端与本地旋转，再按实例写回骨骼
//!
//! 帧数据在派发时整体移交给工作线程，完成后通过 `FrameSlot` 交还；
//! 作业在途期间调度器手里没有任何数组，结构修改只能先等待完成。

use std::ops::Range;
use std::sync::{Arc, Condvar, Mutex};

use bitflags::bitflags;
use glam::{Quat, Vec3};
use rayon::prelude::*;

use crate::skeleton::SharedSkeleton;

use super::collider::{ColliderGroup, ColliderLookup, WorldSphere};
use super::debug::{DebugSnapshot, NodeDebug};
use super::instance::SpringBoneInstance;
use super::kernel::{self, NodePose, StepParams};
use super::node::{CenterMatrix, NodeParams, NodeRest, NodeState};

// ============================================================================
// 任务图
// ============================================================================

bitflags! {
    /// 阶段集合
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct PhaseSet: u8 {
        const COLLIDER_HASH = 1 << 0;
        const PARENT_SNAPSHOT = 1 << 1;
        const INTEGRATE = 1 << 2;
    }
}

/// 管线阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    ColliderHash,
    ParentSnapshot,
    Integrate,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::ColliderHash, Phase::ParentSnapshot, Phase::Integrate];

    #[inline]
    pub fn flag(self) -> PhaseSet {
        match self {
            Phase::ColliderHash => PhaseSet::COLLIDER_HASH,
            Phase::ParentSnapshot => PhaseSet::PARENT_SNAPSHOT,
            Phase::Integrate => PhaseSet::INTEGRATE,
        }
    }

    /// 依赖边：该阶段开始前必须全部完成的阶段
    #[inline]
    pub fn dependencies(self) -> PhaseSet {
        match self {
            Phase::ColliderHash | Phase::ParentSnapshot => PhaseSet::empty(),
            Phase::Integrate => PhaseSet::COLLIDER_HASH | PhaseSet::PARENT_SNAPSHOT,
        }
    }

    #[inline]
    pub fn is_ready(self, completed: PhaseSet) -> bool {
        completed.contains(self.dependencies())
    }
}

// ============================================================================
// 扁平化帧数据
// ============================================================================

/// 节点作业数据（全局索引）
#[derive(Clone, Debug)]
pub(crate) struct NodeJob {
    /// 所属实例（`skeletons` 索引）
    pub instance: u32,
    pub bone: u32,
    pub parent: Option<u32>,
    pub rest: NodeRest,
    pub params: NodeParams,
    /// 全局 Center 槽位
    pub center: Option<u32>,
    /// `node_groups` 中的区间
    pub groups: Range<u32>,
}

#[derive(Clone, Debug)]
struct GroupJob {
    instance: u32,
    group: Arc<ColliderGroup>,
}

#[derive(Clone, Copy, Debug)]
struct CenterJob {
    instance: u32,
    bone: u32,
}

/// 一帧所需的全部扁平数组（重建时分配，每帧复用）
#[derive(Debug)]
pub(crate) struct FrameData {
    skeletons: Vec<SharedSkeleton>,
    /// 与 `skeletons` 对齐的实例槽位
    pub(crate) instance_slots: Vec<u32>,
    pub(crate) instance_nodes: Vec<Range<usize>>,
    /// 每个实例需要刷新世界矩阵的子树根（`subtree_roots` 中的区间）
    instance_roots: Vec<Range<usize>>,
    subtree_roots: Vec<u32>,
    pub(crate) nodes: Vec<NodeJob>,
    node_groups: Vec<u32>,
    pub(crate) states: Vec<NodeState>,
    poses: Vec<NodePose>,
    rotations: Vec<Quat>,
    groups: Vec<GroupJob>,
    lookup: ColliderLookup,
    center_jobs: Vec<CenterJob>,
    centers: Vec<CenterMatrix>,
    step: StepParams,
    completed: PhaseSet,
}

impl FrameData {
    /// 把若干实例扁平化，O(节点总数)
    pub(crate) fn build<'a>(instances: impl Iterator<Item = (u32, &'a SpringBoneInstance)>) -> Self {
        let mut frame = Self {
            skeletons: Vec::new(),
            instance_slots: Vec::new(),
            instance_nodes: Vec::new(),
            instance_roots: Vec::new(),
            subtree_roots: Vec::new(),
            nodes: Vec::new(),
            node_groups: Vec::new(),
            states: Vec::new(),
            poses: Vec::new(),
            rotations: Vec::new(),
            groups: Vec::new(),
            lookup: ColliderLookup::default(),
            center_jobs: Vec::new(),
            centers: Vec::new(),
            step: StepParams {
                dt: 0.0,
                external_force: Vec3::ZERO,
                collision_enabled: true,
            },
            completed: PhaseSet::empty(),
        };

        let mut group_sizes = Vec::new();
        for (slot, instance) in instances {
            let instance_index = frame.skeletons.len() as u32;
            let group_base = frame.groups.len() as u32;
            let center_base = frame.center_jobs.len() as u32;

            let bone_count = {
                let skeleton = instance.skeleton().read().unwrap_or_else(|e| e.into_inner());
                skeleton.len()
            };

            for group in instance.collider_groups() {
                // 所挂骨骼不存在的组不占球位，等价于没有碰撞约束
                let size = if group.bone() < bone_count { group.spheres().len() } else { 0 };
                group_sizes.push(size);
                frame.groups.push(GroupJob {
                    instance: instance_index,
                    group: Arc::clone(group),
                });
            }
            for &bone in instance.centers() {
                frame.center_jobs.push(CenterJob {
                    instance: instance_index,
                    bone: bone as u32,
                });
            }

            let node_start = frame.nodes.len();
            for node in instance.nodes() {
                let groups_start = frame.node_groups.len() as u32;
                frame.node_groups.extend(node.collider_groups().iter().map(|g| g + group_base));
                frame.nodes.push(NodeJob {
                    instance: instance_index,
                    bone: node.bone() as u32,
                    parent: node.parent().map(|p| p as u32),
                    rest: *node.rest(),
                    params: *node.params(),
                    center: node.center().map(|c| c + center_base),
                    groups: groups_start..frame.node_groups.len() as u32,
                });
                frame.states.push(node.state());
            }

            // 父骨骼不受本实例驱动的节点即子树根，写回后只需从这些根向下刷新
            let mut driven = vec![false; bone_count];
            for node in instance.nodes() {
                driven[node.bone()] = true;
            }
            let roots_start = frame.subtree_roots.len();
            frame.subtree_roots.extend(
                instance
                    .nodes()
                    .iter()
                    .filter(|node| node.parent().map_or(true, |p| !driven[p]))
                    .map(|node| node.bone() as u32),
            );
            frame.instance_roots.push(roots_start..frame.subtree_roots.len());

            frame.instance_nodes.push(node_start..frame.nodes.len());
            frame.instance_slots.push(slot);
            frame.skeletons.push(Arc::clone(instance.skeleton()));
        }

        let node_count = frame.nodes.len();
        frame.poses = vec![NodePose::IDENTITY; node_count];
        frame.rotations = vec![Quat::IDENTITY; node_count];
        frame.centers = vec![CenterMatrix::IDENTITY; frame.center_jobs.len()];
        frame.lookup = ColliderLookup::with_group_sizes(group_sizes);

        // 未跑过任何帧时调试快照也能拿到有效的 head
        snapshot_parent_rotations(&frame.skeletons, &frame.nodes, &mut frame.poses);
        frame.refresh_centers();
        frame
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn collider_group_count(&self) -> usize {
        self.groups.len()
    }

    #[inline]
    pub fn instance_count(&self) -> usize {
        self.skeletons.len()
    }

    /// 最近一次执行完成的阶段
    #[inline]
    pub fn completed(&self) -> PhaseSet {
        self.completed
    }

    #[inline]
    pub fn lookup(&self) -> &ColliderLookup {
        &self.lookup
    }

    /// 设置本帧步进参数
    pub(crate) fn prepare(&mut self, step: StepParams) {
        self.step = step;
        self.completed = PhaseSet::empty();
    }

    /// 刷新 Center 矩阵（必须在调用线程、派发之前执行）
    pub(crate) fn refresh_centers(&mut self) {
        for (job, matrix) in self.center_jobs.iter().zip(self.centers.iter_mut()) {
            let skeleton = self.skeletons[job.instance as usize]
                .read()
                .unwrap_or_else(|e| e.into_inner());
            *matrix = CenterMatrix::from_world(skeleton.world_matrix(job.bone as usize));
        }
    }

    /// 按依赖边执行三个阶段（在工作线程池内调用）
    pub fn run(&mut self) {
        let Self {
            skeletons,
            instance_nodes,
            instance_roots,
            subtree_roots,
            nodes,
            node_groups,
            states,
            poses,
            rotations,
            groups,
            lookup,
            centers,
            step,
            completed,
            ..
        } = self;
        *completed = PhaseSet::empty();
        let skeletons = &*skeletons;
        let instance_nodes = &*instance_nodes;
        let groups = &*groups;
        let nodes = &*nodes;

        // 阶段 1 与阶段 2 相互独立，并行执行后汇合
        let (hashed, snapshotted) = rayon::join(
            || {
                let (ranges, spheres) = lookup.split_mut();
                hash_collider_groups(skeletons, groups, ranges, spheres);
                Phase::ColliderHash
            },
            || {
                snapshot_parent_rotations(skeletons, nodes, poses);
                Phase::ParentSnapshot
            },
        );
        *completed |= hashed.flag() | snapshotted.flag();

        debug_assert!(
            Phase::Integrate.is_ready(*completed),
            "integrate dispatched before its dependencies: {:?}",
            completed
        );

        let step = *step;
        let lookup = &*lookup;
        let centers = &*centers;
        let node_groups = &*node_groups;
        states
            .par_iter_mut()
            .zip(rotations.par_iter_mut())
            .zip(nodes.par_iter().zip(poses.par_iter()))
            .for_each(|((state, rotation), (node, pose))| {
                let spheres = node_groups[node.groups.start as usize..node.groups.end as usize]
                    .iter()
                    .flat_map(move |&g| lookup.group(g as usize).iter());
                let center = node.center.map(|c| &centers[c as usize]);
                *rotation = kernel::step_node(
                    &node.rest,
                    &node.params,
                    state,
                    *pose,
                    center,
                    &step,
                    spheres,
                );
            });

        // 每个实例一把写锁，只写自己节点的骨骼
        let rotations = &*rotations;
        let subtree_roots = &*subtree_roots;
        skeletons
            .par_iter()
            .zip(instance_nodes.par_iter().zip(instance_roots.par_iter()))
            .for_each(|(skeleton, (range, roots))| {
                let mut bones = skeleton.write().unwrap_or_else(|e| e.into_inner());
                for i in range.clone() {
                    bones.set_local_rotation(nodes[i].bone as usize, rotations[i]);
                }
                for &root in &subtree_roots[roots.clone()] {
                    bones.update_world_transform_recursive(root as usize);
                }
            });
        *completed |= Phase::Integrate.flag();
    }

    /// 上一帧完成后的尾端与碰撞球（世界空间）
    pub(crate) fn debug_snapshot(&self) -> DebugSnapshot {
        let nodes = self
            .nodes
            .iter()
            .zip(&self.states)
            .zip(&self.poses)
            .map(|((node, state), pose)| {
                let tail = match node.center {
                    Some(c) => self.centers[c as usize].to_world.transform_point3(state.current_tail),
                    None => state.current_tail,
                };
                NodeDebug {
                    head: pose.head,
                    tail,
                    hit_radius: node.params.hit_radius,
                }
            })
            .collect();
        DebugSnapshot {
            nodes,
            spheres: self.lookup.spheres().to_vec(),
        }
    }
}

/// 阶段 1：按组二分递归并行，各组写入互不重叠的区间
fn hash_collider_groups(
    skeletons: &[SharedSkeleton],
    groups: &[GroupJob],
    ranges: &[Range<usize>],
    out: &mut [WorldSphere],
) {
    match groups.len() {
        0 => {}
        1 => {
            let job = &groups[0];
            if out.is_empty() {
                return;
            }
            let skeleton = skeletons[job.instance as usize]
                .read()
                .unwrap_or_else(|e| e.into_inner());
            job.group.transform_into(skeleton.world_matrix(job.group.bone()), out);
        }
        len => {
            let mid = len / 2;
            let split = ranges[mid].start - ranges[0].start;
            let (lo, hi) = out.split_at_mut(split);
            rayon::join(
                || hash_collider_groups(skeletons, &groups[..mid], &ranges[..mid], lo),
                || hash_collider_groups(skeletons, &groups[mid..], &ranges[mid..], hi),
            );
        }
    }
}

/// 阶段 2：父骨骼世界旋转与自身位置快照
fn snapshot_parent_rotations(skeletons: &[SharedSkeleton], nodes: &[NodeJob], poses: &mut [NodePose]) {
    poses
        .par_iter_mut()
        .zip(nodes.par_iter())
        .for_each(|(pose, node)| {
            let skeleton = skeletons[node.instance as usize]
                .read()
                .unwrap_or_else(|e| e.into_inner());
            *pose = NodePose {
                head: skeleton.world_position(node.bone as usize),
                parent_rotation: node
                    .parent
                    .map_or(Quat::IDENTITY, |p| skeleton.world_rotation(p as usize)),
            };
        });
}

// ============================================================================
// 完成槽
// ============================================================================

#[derive(Debug)]
enum Completion {
    Idle,
    Pending,
    Done(FrameData),
    Lost,
}

/// 在途作业的完成槽（调度器创建一次，每帧复用）
#[derive(Debug)]
pub(crate) struct FrameSlot {
    state: Mutex<Completion>,
    ready: Condvar,
}

impl FrameSlot {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(Completion::Idle),
            ready: Condvar::new(),
        }
    }

    pub(crate) fn begin(&self) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = Completion::Pending;
    }

    /// 工作线程交还帧数据；None 表示作业 panic，数据已丢失
    pub(crate) fn finish(&self, frame: Option<FrameData>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *state = match frame {
            Some(frame) => Completion::Done(frame),
            None => Completion::Lost,
        };
        self.ready.notify_all();
    }

    /// 阻塞直到作业结束
    pub(crate) fn wait(&self) -> Option<FrameData> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        while matches!(*state, Completion::Pending) {
            state = self.ready.wait(state).unwrap_or_else(|e| e.into_inner());
        }
        match std::mem::replace(&mut *state, Completion::Idle) {
            Completion::Done(frame) => Some(frame),
            Completion::Lost | Completion::Idle | Completion::Pending => None,
        }
    }
}
