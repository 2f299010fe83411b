//! Mock 传输
//!
//! 预先排队响应帧，并记录所有发出的帧。克隆体共享同一队列，
//! 测试代码可以保留一个克隆用于检查。
//!
//! 排队的响应按批次编排：每次 `send` 释放下一批到接收队列，
//! 因此响应不会早于对应的请求被读到。主动推送的帧（通知、迟到的响应）
//! 通过 [`MockTransport::push_unsolicited`] 直接进入接收队列。

use crate::{CommandTransport, TransportError};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

#[derive(Debug)]
enum Reply {
    Frame(Bytes),
    Timeout,
}

#[derive(Debug, Default)]
struct Inner {
    /// 尚未释放的批次，每次发送释放一批
    script: VecDeque<Vec<Reply>>,
    /// 已释放、待接收
    inbox: VecDeque<Reply>,
    sent: Vec<Bytes>,
    closed: bool,
}

/// 内存中的命令通道
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 排队一条响应帧，由下一次未分配的发送释放
    pub fn queue_reply(&self, frame: impl Into<Bytes>) {
        self.inner
            .lock()
            .script
            .push_back(vec![Reply::Frame(frame.into())]);
    }

    /// 排队多条帧，由同一次发送一并释放
    pub fn queue_replies<I, F>(&self, frames: I)
    where
        I: IntoIterator<Item = F>,
        F: Into<Bytes>,
    {
        let batch = frames.into_iter().map(|frame| Reply::Frame(frame.into())).collect();
        self.inner.lock().script.push_back(batch);
    }

    /// 排队一次超时：对应的发送之后，下一次接收返回 [`TransportError::Timeout`]
    pub fn queue_timeout(&self) {
        self.inner.lock().script.push_back(vec![Reply::Timeout]);
    }

    /// 不经请求直接投递一帧
    pub fn push_unsolicited(&self, frame: impl Into<Bytes>) {
        self.inner.lock().inbox.push_back(Reply::Frame(frame.into()));
    }

    /// 取出所有已发送帧
    pub fn take_sent(&self) -> Vec<Bytes> {
        std::mem::take(&mut self.inner.lock().sent)
    }

    /// 尚未被消费的响应数（含未释放的批次）
    pub fn pending_replies(&self) -> usize {
        let inner = self.inner.lock();
        inner.inbox.len() + inner.script.iter().map(Vec::len).sum::<usize>()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl CommandTransport for MockTransport {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(TransportError::Closed);
        }
        trace!(frame = %crate::hex_dump(frame), "mock send");
        inner.sent.push(Bytes::copy_from_slice(frame));
        if let Some(batch) = inner.script.pop_front() {
            inner.inbox.extend(batch);
        }
        Ok(())
    }

    fn receive_timeout(&mut self, _timeout: Duration) -> Result<Bytes, TransportError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(TransportError::Closed);
        }
        match inner.inbox.pop_front() {
            Some(Reply::Frame(frame)) => Ok(frame),
            Some(Reply::Timeout) | None => Err(TransportError::Timeout),
        }
    }

    fn close(&mut self) {
        self.inner.lock().closed = true;
    }
}
