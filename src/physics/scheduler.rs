//! Spring Bone 全局调度器
//!
//! 持有所有实例节点/碰撞体的扁平数组，每帧派发一次三阶段作业，
//! 并在下一帧开始时才阻塞等待完成（换取一帧延迟与工作线程的充分利用）。
//! 流程：add_instance / remove_instance → 重建 → 每帧 [complete → 刷新 Center → 派发]

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use glam::Vec3;

use crate::skeleton::SharedSkeleton;
use crate::{Result, SpringBoneError};

use super::config::{get_config, SpringBoneConfig};
use super::debug::DebugSnapshot;
use super::instance::SpringBoneInstance;
use super::kernel::StepParams;
use super::pipeline::{FrameData, FrameSlot};

/// 实例句柄（代际索引，移除后旧句柄失效）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstanceHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    instance: Option<SpringBoneInstance>,
}

/// Spring Bone 全局调度器
pub struct SpringBoneScheduler {
    config: SpringBoneConfig,
    pool: rayon::ThreadPool,

    /// 实例竞技场
    slots: Vec<Slot>,
    free: Vec<u32>,

    /// 扁平帧数据；作业在途时为 None（已移交工作线程）
    frame: Option<FrameData>,
    completion: Arc<FrameSlot>,
    in_flight: bool,
}

impl SpringBoneScheduler {
    /// 使用全局配置创建
    pub fn new() -> Result<Self> {
        Self::with_config(get_config())
    }

    pub fn with_config(config: SpringBoneConfig) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|i| format!("spring-bone-{i}"))
            .build()?;

        log::info!(
            "[SpringBone] 调度器创建: {} 工作线程",
            pool.current_num_threads()
        );

        Ok(Self {
            config,
            pool,
            slots: Vec::new(),
            free: Vec::new(),
            frame: Some(FrameData::build(std::iter::empty())),
            completion: Arc::new(FrameSlot::new()),
            in_flight: false,
        })
    }

    // ========================================
    // 注册
    // ========================================

    /// 注册骨骼实例；同一骨骼重复注册返回已有句柄
    pub fn add_instance(&mut self, skeleton: SharedSkeleton) -> Result<InstanceHandle> {
        if let Some(handle) = self.find(&skeleton) {
            log::debug!("[SpringBone] 骨骼已注册，忽略重复注册 {:?}", handle);
            return Ok(handle);
        }

        self.settle();
        self.sync_states();
        let mut instance = SpringBoneInstance::new(skeleton);
        instance.initialize(&self.config)?;

        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.instance = Some(instance);
                InstanceHandle { index, generation: slot.generation }
            }
            None => {
                self.slots.push(Slot { generation: 0, instance: Some(instance) });
                InstanceHandle { index: (self.slots.len() - 1) as u32, generation: 0 }
            }
        };

        self.rebuild();
        Ok(handle)
    }

    /// 移除实例；未注册或已移除的句柄返回 false
    pub fn remove_instance(&mut self, handle: InstanceHandle) -> bool {
        if !self.contains(handle) {
            log::debug!("[SpringBone] 移除未注册的实例 {:?}，忽略", handle);
            return false;
        }

        self.settle();
        // 先把在途状态写回实例，再拿走
        self.sync_states();
        let slot = &mut self.slots[handle.index as usize];
        if let Some(mut instance) = slot.instance.take() {
            instance.dispose();
        }
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);

        self.rebuild();
        true
    }

    /// 句柄是否仍然有效
    pub fn contains(&self, handle: InstanceHandle) -> bool {
        self.slots
            .get(handle.index as usize)
            .is_some_and(|slot| slot.generation == handle.generation && slot.instance.is_some())
    }

    /// 实例（其中的尾端状态只在重建时同步，实时结果请用 `debug_snapshot`）
    pub fn instance(&self, handle: InstanceHandle) -> Option<&SpringBoneInstance> {
        if !self.contains(handle) {
            return None;
        }
        self.slots[handle.index as usize].instance.as_ref()
    }

    /// 恢复实例的初始姿态与尾端
    pub fn reset_instance(&mut self, handle: InstanceHandle) -> bool {
        if !self.contains(handle) {
            return false;
        }
        self.settle();
        self.sync_states();
        if let Some(instance) = self.slots[handle.index as usize].instance.as_mut() {
            instance.reset();
        }
        self.rebuild();
        true
    }

    fn find(&self, skeleton: &SharedSkeleton) -> Option<InstanceHandle> {
        self.slots.iter().enumerate().find_map(|(index, slot)| {
            slot.instance
                .as_ref()
                .filter(|instance| Arc::ptr_eq(instance.skeleton(), skeleton))
                .map(|_| InstanceHandle { index: index as u32, generation: slot.generation })
        })
    }

    fn live_instances(&self) -> impl Iterator<Item = (u32, &SpringBoneInstance)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.instance.as_ref().map(|i| (index as u32, i)))
    }

    // ========================================
    // 重建
    // ========================================

    /// 把当前帧数据中的尾端状态写回各实例
    fn sync_states(&mut self) {
        let Some(frame) = self.frame.as_ref() else {
            return;
        };
        for (slot, range) in frame.instance_slots.iter().zip(&frame.instance_nodes) {
            if let Some(instance) = self.slots[*slot as usize].instance.as_mut() {
                instance.store_states(&frame.states[range.clone()]);
            }
        }
    }

    /// 丢弃并重建全部扁平数组（调用前作业必须已完成，状态已写回实例）
    fn rebuild(&mut self) {
        debug_assert!(!self.in_flight, "rebuild while pipeline in flight");
        // 构建时的姿态快照也在本调度器的线程池内执行
        let frame = self.pool.install(|| FrameData::build(self.live_instances()));

        log::info!(
            "[SpringBone] 重建完成: {} 实例, {} 节点, {} 碰撞体组, {} 碰撞球",
            frame.instance_count(),
            frame.node_count(),
            frame.collider_group_count(),
            frame.lookup().sphere_count()
        );
        self.frame = Some(frame);
    }

    /// 等待在途作业；作业丢失时已自动重建，这里只记录
    fn settle(&mut self) {
        if let Err(e) = self.complete() {
            log::error!("[SpringBone] {}", e);
        }
    }

    // ========================================
    // 每帧
    // ========================================

    /// 完成上一帧并派发本帧
    ///
    /// 结果在下一次 `update` / `complete` 返回后才写回骨骼。
    pub fn update(&mut self, delta_time: f32) -> Result<()> {
        self.complete()?;

        if !self.config.enabled {
            return Ok(());
        }
        if !delta_time.is_finite() || delta_time <= 0.0 {
            return Ok(());
        }
        let dt = delta_time.min(self.config.max_delta_time);

        let Some(mut frame) = self.frame.take() else {
            return Ok(());
        };
        if frame.node_count() == 0 {
            self.frame = Some(frame);
            return Ok(());
        }

        // Center 矩阵依赖宿主的普通骨骼层级，只能在调用线程计算
        frame.refresh_centers();
        frame.prepare(StepParams {
            dt,
            external_force: self.config.external_force,
            collision_enabled: self.config.collision_enabled,
        });

        if self.config.debug_log {
            log::debug!("[SpringBone] 派发: {} 节点, dt={}", frame.node_count(), dt);
        }

        self.completion.begin();
        self.in_flight = true;
        let completion = Arc::clone(&self.completion);
        self.pool.spawn(move || {
            let mut frame = frame;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| frame.run()));
            completion.finish(outcome.ok().map(|()| frame));
        });
        Ok(())
    }

    /// 阻塞等待在途作业完成（无作业时立即返回）
    ///
    /// 读取骨骼结果前必须调用。
    pub fn complete(&mut self) -> Result<()> {
        if !self.in_flight {
            return Ok(());
        }
        self.in_flight = false;

        match self.completion.wait() {
            Some(frame) => {
                self.frame = Some(frame);
                Ok(())
            }
            None => {
                // 工作线程 panic，用实例中上次同步的状态重建
                self.rebuild();
                Err(SpringBoneError::PipelineLost)
            }
        }
    }

    #[inline]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// 上一完成帧的尾端与碰撞球（会先等待在途作业）
    pub fn debug_snapshot(&mut self) -> Result<DebugSnapshot> {
        self.complete()?;
        Ok(self.frame.as_ref().map(FrameData::debug_snapshot).unwrap_or_default())
    }

    // ========================================
    // 参数
    // ========================================

    #[inline]
    pub fn config(&self) -> &SpringBoneConfig {
        &self.config
    }

    /// 设置全局外力（下一次派发生效）
    pub fn set_external_force(&mut self, force: Vec3) {
        self.config.external_force = force;
    }

    #[inline]
    pub fn external_force(&self) -> Vec3 {
        self.config.external_force
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    pub fn set_collision_enabled(&mut self, enabled: bool) {
        self.config.collision_enabled = enabled;
    }

    // ========================================
    // 统计
    // ========================================

    pub fn instance_count(&self) -> usize {
        self.live_instances().count()
    }

    pub fn node_count(&self) -> usize {
        self.live_instances().map(|(_, i)| i.node_count()).sum()
    }

    pub fn collider_group_count(&self) -> usize {
        self.live_instances().map(|(_, i)| i.collider_groups().len()).sum()
    }
}

impl Drop for SpringBoneScheduler {
    fn drop(&mut self) {
        // 工作线程可能仍持有骨骼写锁，先等它结束
        self.settle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collider::{ColliderGroup, SphereCollider};
    use crate::physics::instance::SpringBoneSettings;
    use crate::skeleton::{BoneSet, BoneTransform};
    use glam::Quat;

    const EPS: f32 = 1e-4;
    const DT: f32 = 1.0 / 60.0;
    /// 3 节点链在重力 1 下 60 帧后的末端尾端
    const SETTLED_CHAIN_TAIL: Vec3 = Vec3::new(0.12848824, 0.7388229, 0.0);

    fn scheduler(leaf_tail_length: f32) -> SpringBoneScheduler {
        SpringBoneScheduler::with_config(SpringBoneConfig {
            worker_threads: 2,
            leaf_tail_length,
            ..SpringBoneConfig::default()
        })
        .unwrap()
    }

    /// 水平 3 节点链，每段 0.1
    fn chain_skeleton(gravity_power: f32) -> SharedSkeleton {
        let mut set = BoneSet::new();
        let b0 = set.add_bone("b0", None, BoneTransform::from_translation(Vec3::new(0.0, 1.0, 0.0))).unwrap();
        let b1 = set.add_bone("b1", Some(b0), BoneTransform::from_translation(Vec3::new(0.1, 0.0, 0.0))).unwrap();
        set.add_bone("b2", Some(b1), BoneTransform::from_translation(Vec3::new(0.1, 0.0, 0.0))).unwrap();
        let mut settings = SpringBoneSettings::new("chain").with_roots([b0]);
        settings.gravity_power = gravity_power;
        settings.gravity_dir = Vec3::NEG_Y;
        settings.stiffness = 1.0;
        settings.drag = 0.4;
        set.add_spring(settings);
        set.into_shared()
    }

    /// 单节点：骨骼位于 (0, 0.08, 0)，静止尾端落在原点半径 0.05 的球内
    fn single_node_in_sphere() -> (SharedSkeleton, Vec3) {
        let angle: f32 = 0.3;
        let dir = Vec3::new(angle.sin(), -angle.cos(), 0.0);
        let head = Vec3::new(0.0, 0.08, 0.0);
        let mut set = BoneSet::new();
        let anchor = set.add_bone("anchor", None, BoneTransform::from_translation(head - dir * 0.1)).unwrap();
        let bone = set.add_bone("bone", Some(anchor), BoneTransform::from_translation(dir * 0.1)).unwrap();
        let body = Arc::new(ColliderGroup::new("body", anchor, vec![
            SphereCollider::new(-(head - dir * 0.1), 0.05),
        ]));
        let mut settings = SpringBoneSettings::new("single")
            .with_roots([bone])
            .with_collider_group(body);
        settings.hit_radius = 0.0;
        settings.gravity_power = 0.0;
        set.add_spring(settings);
        (set.into_shared(), head + dir * 0.1)
    }

    fn run(scheduler: &mut SpringBoneScheduler, ticks: usize) {
        for _ in 0..ticks {
            scheduler.update(DT).unwrap();
        }
        scheduler.complete().unwrap();
    }

    fn local_rotations(skeleton: &SharedSkeleton) -> Vec<Quat> {
        skeleton.read().unwrap().bones().iter().map(|b| b.rotation).collect()
    }

    #[test]
    fn test_bone_length_preserved_with_gravity() {
        let mut scheduler = scheduler(0.1);
        scheduler.add_instance(chain_skeleton(1.0)).unwrap();
        for _ in 0..30 {
            scheduler.update(DT).unwrap();
            let snapshot = scheduler.debug_snapshot().unwrap();
            for node in &snapshot.nodes {
                assert!(((node.tail - node.head).length() - 0.1).abs() < EPS);
            }
        }
    }

    #[test]
    fn test_snapshot_head_is_solve_time_position() {
        let skeleton = chain_skeleton(1.0);
        let mut scheduler = scheduler(0.1);
        scheduler.add_instance(Arc::clone(&skeleton)).unwrap();
        run(&mut scheduler, 1);

        let snapshot = scheduler.debug_snapshot().unwrap();
        let head = snapshot.nodes[1].head;
        assert!((head - Vec3::new(0.1, 1.0, 0.0)).length() < 1e-6);
        // 写回旋转后 b1 已经随 b0 下垂
        let live = skeleton.read().unwrap().world_position(1);
        assert!(live.y < head.y - 1e-3);
        assert!(((snapshot.nodes[1].tail - head).length() - 0.1).abs() < EPS);
    }

    #[test]
    fn test_scenario_chain_settles_below_rest() {
        let skeleton = chain_skeleton(1.0);
        let mut scheduler = scheduler(0.1);
        scheduler.add_instance(Arc::clone(&skeleton)).unwrap();
        assert_eq!(scheduler.node_count(), 3);
        run(&mut scheduler, 60);

        let snapshot = scheduler.debug_snapshot().unwrap();
        let last = snapshot.nodes[2].tail;
        let rest = Vec3::new(0.3, 1.0, 0.0);
        assert!(last.y < rest.y - 0.01);
        // 链总长 0.3，尾端不可能离根超过 0.3
        assert!((last - Vec3::new(0.0, 1.0, 0.0)).length() <= 0.3 + EPS);
        // 第 60 帧的基准值
        assert!((last - SETTLED_CHAIN_TAIL).length() < 1e-4, "tail at tick 60: {last:?}");

        // 之后保持静止
        run(&mut scheduler, 20);
        let mut previous = scheduler.debug_snapshot().unwrap().nodes[2].tail;
        for _ in 0..20 {
            run(&mut scheduler, 1);
            let tail = scheduler.debug_snapshot().unwrap().nodes[2].tail;
            assert!((tail - previous).length() < 1e-5);
            previous = tail;
        }
        assert!((previous - SETTLED_CHAIN_TAIL).length() < 1e-4);

        // 两次独立运行得到相同结果
        let again = chain_skeleton(1.0);
        let mut other = self::scheduler(0.1);
        other.add_instance(Arc::clone(&again)).unwrap();
        run(&mut other, 60);
        let other_last = other.debug_snapshot().unwrap().nodes[2].tail;
        assert!((last - other_last).length() < 1e-6);
        for (a, b) in local_rotations(&skeleton).iter().zip(local_rotations(&again).iter()) {
            assert!(a.dot(*b).abs() > 1.0 - 1e-6);
        }
    }

    #[test]
    fn test_rest_idempotence_without_gravity() {
        let skeleton = chain_skeleton(0.0);
        let mut scheduler = scheduler(0.1);
        scheduler.add_instance(Arc::clone(&skeleton)).unwrap();
        let before = scheduler.debug_snapshot().unwrap();
        run(&mut scheduler, 120);
        let after = scheduler.debug_snapshot().unwrap();
        for (a, b) in before.nodes.iter().zip(&after.nodes) {
            assert!((a.tail - b.tail).length() < EPS);
        }
        for rotation in local_rotations(&skeleton) {
            assert!(rotation.dot(Quat::IDENTITY).abs() > 1.0 - 1e-5);
        }
    }

    #[test]
    fn test_scenario_single_node_pushed_onto_sphere() {
        let (skeleton, rest_tail) = single_node_in_sphere();
        assert!(rest_tail.length() < 0.05);

        let mut scheduler = scheduler(0.1);
        scheduler.add_instance(skeleton).unwrap();
        assert_eq!(scheduler.node_count(), 1);
        run(&mut scheduler, 1);

        let snapshot = scheduler.debug_snapshot().unwrap();
        let node = snapshot.nodes[0];
        assert!((node.tail.length() - 0.05).abs() < EPS);
        assert!(((node.tail - node.head).length() - 0.1).abs() < EPS);
        // 停留在碰撞前的一侧
        assert!(node.tail.normalize().dot(rest_tail.normalize()) > 0.0);
        assert_eq!(snapshot.spheres.len(), 1);
        assert!(snapshot.spheres[0].center.length() < 1e-5);
    }

    #[test]
    fn test_collision_disabled_allows_penetration() {
        let (skeleton, rest_tail) = single_node_in_sphere();
        let mut scheduler = scheduler(0.1);
        scheduler.set_collision_enabled(false);
        assert!(!scheduler.config().collision_enabled);
        scheduler.add_instance(skeleton).unwrap();
        run(&mut scheduler, 10);

        let snapshot = scheduler.debug_snapshot().unwrap();
        let node = snapshot.nodes[0];
        // 没有碰撞约束，尾端留在球内的静止位置
        assert!((node.tail - rest_tail).length() < EPS);
        assert!((node.tail - snapshot.spheres[0].center).length() < snapshot.spheres[0].radius - 0.01);
        assert!(((node.tail - node.head).length() - 0.1).abs() < EPS);

        // 重新打开后下一帧被推出
        scheduler.set_collision_enabled(true);
        run(&mut scheduler, 1);
        let node = scheduler.debug_snapshot().unwrap().nodes[0];
        assert!((node.tail.length() - 0.05).abs() < EPS);
    }

    #[test]
    fn test_non_penetration_under_gravity() {
        let (skeleton, _) = single_node_in_sphere();
        {
            let mut set = skeleton.write().unwrap();
            // 加一条受重力的链一起跑
            let extra = set.add_bone("extra", Some(0), BoneTransform::from_translation(Vec3::new(0.1, 0.0, 0.0))).unwrap();
            let mut settings = SpringBoneSettings::new("extra")
                .with_roots([extra])
                .with_collider_group(Arc::clone(&set.springs()[0].collider_groups[0]));
            settings.gravity_power = 2.0;
            settings.hit_radius = 0.01;
            set.add_spring(settings);
        }
        let mut scheduler = scheduler(0.1);
        scheduler.add_instance(skeleton).unwrap();
        assert_eq!(scheduler.collider_group_count(), 1);
        for _ in 0..60 {
            scheduler.update(DT).unwrap();
            let snapshot = scheduler.debug_snapshot().unwrap();
            let sphere = snapshot.spheres[0];
            for node in &snapshot.nodes {
                let min = sphere.radius + node.hit_radius;
                assert!((node.tail - sphere.center).length() >= min - EPS);
            }
        }
    }

    #[test]
    fn test_add_remove_symmetry_and_idempotence() {
        let mut scheduler = scheduler(0.07);
        let first = scheduler.add_instance(chain_skeleton(1.0)).unwrap();
        let nodes = scheduler.node_count();
        let groups = scheduler.collider_group_count();

        let (extra, _) = single_node_in_sphere();
        let handle = scheduler.add_instance(Arc::clone(&extra)).unwrap();
        // 重复注册返回同一句柄
        assert_eq!(scheduler.add_instance(Arc::clone(&extra)).unwrap(), handle);
        assert_eq!(scheduler.instance_count(), 2);
        scheduler.update(DT).unwrap();

        assert!(scheduler.remove_instance(handle));
        assert!(!scheduler.remove_instance(handle));
        assert!(!scheduler.contains(handle));
        assert_eq!(scheduler.node_count(), nodes);
        assert_eq!(scheduler.collider_group_count(), groups);
        assert_eq!(scheduler.debug_snapshot().unwrap().nodes.len(), nodes);

        // 槽位复用后旧句柄依旧无效
        let reused = scheduler.add_instance(extra).unwrap();
        assert_ne!(reused, handle);
        assert!(scheduler.contains(reused));
        assert!(scheduler.contains(first));
    }

    #[test]
    fn test_rebuild_keeps_simulation_state() {
        let skeleton = chain_skeleton(1.0);
        let mut scheduler = scheduler(0.1);
        scheduler.add_instance(Arc::clone(&skeleton)).unwrap();
        run(&mut scheduler, 20);
        let before = scheduler.debug_snapshot().unwrap();

        // 其他实例加入触发重建，已有链的尾端不应跳回静止姿态
        let (extra, _) = single_node_in_sphere();
        scheduler.add_instance(extra).unwrap();
        let after = scheduler.debug_snapshot().unwrap();
        for (a, b) in before.nodes.iter().zip(&after.nodes) {
            assert!((a.tail - b.tail).length() < 1e-6);
        }
    }

    #[test]
    fn test_reset_instance_restores_pose() {
        let skeleton = chain_skeleton(1.0);
        let mut scheduler = scheduler(0.1);
        let handle = scheduler.add_instance(Arc::clone(&skeleton)).unwrap();
        run(&mut scheduler, 30);
        assert!(local_rotations(&skeleton)[0].dot(Quat::IDENTITY).abs() < 1.0 - 1e-6);

        assert!(scheduler.reset_instance(handle));
        for rotation in local_rotations(&skeleton) {
            assert!(rotation.dot(Quat::IDENTITY).abs() > 1.0 - 1e-6);
        }
        let snapshot = scheduler.debug_snapshot().unwrap();
        assert!((snapshot.nodes[2].tail - Vec3::new(0.3, 1.0, 0.0)).length() < EPS);
    }

    #[test]
    fn test_center_space_chain_follows_root_motion() {
        let mut set = BoneSet::new();
        let root = set.add_bone("root", None, BoneTransform::default()).unwrap();
        let b0 = set.add_bone("b0", Some(root), BoneTransform::from_translation(Vec3::new(0.0, 1.0, 0.0))).unwrap();
        let b1 = set.add_bone("b1", Some(b0), BoneTransform::from_translation(Vec3::new(0.1, 0.0, 0.0))).unwrap();
        set.add_bone("b2", Some(b1), BoneTransform::from_translation(Vec3::new(0.1, 0.0, 0.0))).unwrap();
        let mut settings = SpringBoneSettings::new("chain").with_roots([b1]);
        settings.center = Some(root);
        set.add_spring(settings);
        let skeleton = set.into_shared();

        let mut scheduler = scheduler(0.1);
        scheduler.add_instance(Arc::clone(&skeleton)).unwrap();

        // 整体平移：Center 空间下链相对根不动
        for step in 1..=30 {
            scheduler.complete().unwrap();
            {
                let mut bones = skeleton.write().unwrap();
                bones.set_local_translation(root, Vec3::new(step as f32 * 0.5, 0.0, 0.0));
                bones.update_world_transforms();
            }
            scheduler.update(DT).unwrap();
        }
        scheduler.complete().unwrap();
        for rotation in local_rotations(&skeleton) {
            assert!(rotation.dot(Quat::IDENTITY).abs() > 1.0 - 1e-4);
        }
    }

    #[test]
    fn test_disabled_keeps_previous_pose() {
        let skeleton = chain_skeleton(1.0);
        let mut scheduler = scheduler(0.1);
        scheduler.add_instance(Arc::clone(&skeleton)).unwrap();
        scheduler.set_enabled(false);
        run(&mut scheduler, 10);
        assert!(!scheduler.is_in_flight());
        for rotation in local_rotations(&skeleton) {
            assert!(rotation.dot(Quat::IDENTITY).abs() > 1.0 - 1e-6);
        }
    }

    #[test]
    fn test_external_force_bends_chain() {
        let skeleton = chain_skeleton(0.0);
        let mut scheduler = scheduler(0.1);
        scheduler.add_instance(Arc::clone(&skeleton)).unwrap();
        scheduler.set_external_force(Vec3::new(0.0, 0.0, 2.0));
        run(&mut scheduler, 30);
        let snapshot = scheduler.debug_snapshot().unwrap();
        assert!(snapshot.nodes[2].tail.z > 0.0);
    }

    #[test]
    fn test_empty_scheduler_update_is_noop() {
        let mut scheduler = scheduler(0.07);
        scheduler.update(DT).unwrap();
        assert!(!scheduler.is_in_flight());
        assert_eq!(scheduler.node_count(), 0);
        assert!(scheduler.debug_snapshot().unwrap().nodes.is_empty());
    }
}
