//! 单写者会话句柄
//!
//! 命令通道（启动/停止/配置）和实时状态通道（故障、运动完成）都会修改
//! 运动轴，因此两条路径都必须经过同一个入口 [`ControllerSession::apply`]：
//! 写入在 `parking_lot::Mutex` 下串行执行，每次写入后把新状态发布到
//! `ArcSwap`，读取方无锁地拿到一致快照。

use crate::error::DriverError;
use crate::machine::{SessionInput, Step, command, step};
use crate::state::{MotionEvent, SessionState};
use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::Mutex;
use rci_protocol::{
    ProtocolVersion, RawSafetyFlags, Request, Response, SafetyViolationSet, classify,
};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// 一次写入的外部可见结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Applied {
    pub response: Option<Response>,
    pub event: Option<MotionEvent>,
    /// 回复后应关闭连接
    pub close: bool,
}

/// 一条命令的执行结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Executed {
    pub response: Response,
    pub event: Option<MotionEvent>,
    pub close: bool,
}

struct Writer {
    state: SessionState,
    subscribers: Vec<Sender<MotionEvent>>,
}

/// 控制器侧会话
pub struct ControllerSession {
    writer: Mutex<Writer>,
    snapshot: ArcSwap<SessionState>,
    server_version: ProtocolVersion,
}

impl ControllerSession {
    pub fn new(server_version: ProtocolVersion) -> Self {
        Self::with_state(server_version, SessionState::default())
    }

    pub(crate) fn with_state(server_version: ProtocolVersion, state: SessionState) -> Self {
        Self {
            writer: Mutex::new(Writer {
                state,
                subscribers: Vec::new(),
            }),
            snapshot: ArcSwap::from_pointee(state),
            server_version,
        }
    }

    /// 控制器支持的协议版本
    pub fn server_version(&self) -> ProtocolVersion {
        self.server_version
    }

    /// 唯一的写入口
    ///
    /// 状态机计算、状态发布和通知广播都在同一把锁内完成，
    /// 订阅者看到的通知顺序与状态变化顺序一致。
    pub fn apply(&self, input: SessionInput) -> Result<Applied, DriverError> {
        let (applied, ()) = self.commit(|state| Ok((step(state, &input, self.server_version)?, ())))?;
        Ok(applied)
    }

    /// 执行一条命令（[`apply`](Self::apply) 的命令专用形式）
    pub fn execute(&self, request: Request) -> Result<Executed, DriverError> {
        let (applied, response) = self.commit(|state| {
            let step = command(state, &request, self.server_version)?;
            Ok((Step::from(step), step.response))
        })?;
        Ok(Executed {
            response,
            event: applied.event,
            close: applied.close,
        })
    }

    fn commit<R>(
        &self,
        transition: impl FnOnce(&SessionState) -> Result<(Step, R), DriverError>,
    ) -> Result<(Applied, R), DriverError> {
        let mut writer = self.writer.lock();
        let (step, output) = transition(&writer.state)?;

        if step.next != writer.state {
            writer.state = step.next;
            self.snapshot.store(Arc::new(step.next));
            trace!("session state updated");
        }

        if let Some(event) = step.event {
            broadcast(&mut writer.subscribers, event);
        }

        let applied = Applied {
            response: step.response,
            event: step.event,
            close: step.close,
        };
        Ok((applied, output))
    }

    /// 获取会话快照（无锁）
    pub fn snapshot(&self) -> Arc<SessionState> {
        self.snapshot.load_full()
    }

    /// 获取会话状态副本（无锁）
    pub fn state(&self) -> SessionState {
        **self.snapshot.load()
    }

    /// 订阅运动结束通知
    ///
    /// 通道有界；订阅者消费过慢时新通知被丢弃并记录警告。
    pub fn subscribe(&self, capacity: usize) -> Receiver<MotionEvent> {
        let (tx, rx) = bounded(capacity.max(1));
        self.writer.lock().subscribers.push(tx);
        rx
    }

    /// 报告实时回路的原始安全标志
    ///
    /// 先经 [`classify`] 映射为具名违规集合，再作为故障输入写入会话。
    pub fn report_safety_flags(&self, raw: RawSafetyFlags) -> Result<Applied, DriverError> {
        self.inject_faults(classify(raw))
    }

    /// 注入已分类的安全违规
    pub fn inject_faults(&self, violations: SafetyViolationSet) -> Result<Applied, DriverError> {
        self.apply(SessionInput::Faults(violations))
    }

    /// 外部中止当前运动
    pub fn abort_motion(&self) -> Result<Applied, DriverError> {
        self.apply(SessionInput::ExternalAbort)
    }

    /// 当前运动按计划完成
    pub fn finish_motion(&self) -> Result<Applied, DriverError> {
        self.apply(SessionInput::MotionFinished)
    }

    /// 连接关闭，销毁会话
    pub fn disconnect(&self) -> Result<Applied, DriverError> {
        self.apply(SessionInput::Disconnect)
    }
}

fn broadcast(subscribers: &mut Vec<Sender<MotionEvent>>, event: MotionEvent) {
    subscribers.retain(|tx| match tx.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(?event, "motion event subscriber full, dropping event");
            true
        },
        Err(TrySendError::Disconnected(_)) => {
            debug!("motion event subscriber gone");
            false
        },
    });
}
