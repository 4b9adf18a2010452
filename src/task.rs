// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 任务循环
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{
  sync::mpsc::{self, TrySendError},
  thread,
  time::{Duration, Instant},
};
use tracing::{debug, info, warn};

use crate::{model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 推理失败的帧按无检测处理
fn infer_or_empty<F, D, M>(model: &M, frame: &F, frame_index: usize) -> D
where
  D: Default,
  M: Model<Input = F, Output = D>,
  M::Error: std::fmt::Display,
{
  match model.infer(frame) {
    Ok(result) => result,
    Err(e) => {
      warn!("第 {} 帧处理失败，按无检测处理: {}", frame_index, e);
      D::default()
    }
  }
}

pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始后处理...");
    let now = Instant::now();
    let result = model.infer(&frame)?;
    info!("后处理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 对同一帧重复处理，统计平均耗时
#[derive(Debug)]
pub struct RepeatShotTask {
  repeat: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { repeat: 1000 }
  }
}

impl RepeatShotTask {
  pub fn with_repeat(mut self, repeat: usize) -> Self {
    self.repeat = repeat.max(1);
    self
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始后处理...");
    let mut times = Vec::with_capacity(self.repeat);
    for i in 0..self.repeat {
      let now = Instant::now();
      let result = model.infer(&frame)?;
      let elapsed = now.elapsed();
      debug!("({})后处理完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&frame, &result)?;
      times.push(elapsed);
    }

    // 前两次作为预热
    let warm = if times.len() > 2 { &times[2..] } else { &times[..] };
    warn!(
      "平均后处理时间: {:.2?}",
      warm.iter().sum::<Duration>() / warm.len() as u32
    );

    Ok(())
  }
}

#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  skip: usize,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 每处理一帧后跳过 `skip` 帧
  pub fn with_skip(mut self, skip: usize) -> Self {
    self.skip = skip;
    self
  }
}

impl<
  F,
  D: Default,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let (tx, rx) = mpsc::channel();

    let handler = ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    });
    if let Err(e) = handler {
      warn!("无法设置中断处理: {}", e);
    }

    let mut frame_index = 0;
    let mut now = Instant::now();
    for frame in input {
      frame_index = (frame_index + 1) % usize::MAX;
      if (frame_index - 1) % (self.skip + 1) == 0 {
        debug!("处理第 {} 帧", frame_index);
        let result = infer_or_empty(&model, &frame, frame_index);
        let elapsed_a = now.elapsed();
        output.render_result(&frame, &result)?;
        let elapsed_b = now.elapsed();
        now = Instant::now();
        info!("第 {} 帧完成，耗时: {:.2?} / {:.2?}", frame_index, elapsed_a, elapsed_b);
      }

      if self.frame_number.map(|n| frame_index >= n).unwrap_or(false) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，退出");
    Ok(())
  }
}

/// 最新帧任务的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
  pub processed: usize,
  pub dropped: usize,
}

/// 工作线程持有后处理与输出，生产端在工作线程忙时直接丢弃新帧
#[derive(Default, Debug)]
pub struct LatestFrameTask;

impl LatestFrameTask {
  pub fn run<F, D, I, M, O>(self, input: I, model: M, output: O) -> anyhow::Result<FrameStats>
  where
    F: Send,
    D: Default,
    I: Iterator<Item = F>,
    M: Model<Input = F, Output = D> + Send,
    M::Error: std::fmt::Display,
    O: Render<F, D> + Send,
    O::Error: std::error::Error + Sync + Send + 'static,
  {
    info!("开始任务...");
    // 容量为 0：只有工作线程正在等待时才能交付
    let (tx, rx) = mpsc::sync_channel::<(usize, F)>(0);

    let (processed, dropped) = thread::scope(|s| {
      let worker = s.spawn(move || -> anyhow::Result<usize> {
        let mut processed = 0;
        while let Ok((frame_index, frame)) = rx.recv() {
          let result = infer_or_empty(&model, &frame, frame_index);
          output.render_result(&frame, &result)?;
          processed += 1;
        }
        Ok(processed)
      });

      let mut dropped = 0;
      for (i, frame) in input.enumerate() {
        match tx.try_send((i + 1, frame)) {
          Ok(()) => {}
          Err(TrySendError::Full(_)) => {
            dropped += 1;
            debug!("后处理忙，丢弃第 {} 帧（累计 {} 帧）", i + 1, dropped);
          }
          Err(TrySendError::Disconnected(_)) => {
            warn!("工作线程已退出，停止读取输入");
            break;
          }
        }
      }
      drop(tx);

      let processed = worker
        .join()
        .map_err(|_| anyhow::anyhow!("工作线程异常退出"))??;
      Ok::<_, anyhow::Error>((processed, dropped))
    })?;

    info!("任务完成，处理 {} 帧，丢弃 {} 帧", processed, dropped);
    Ok(FrameStats { processed, dropped })
  }
}

impl<
  F: Send,
  D: Default,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME> + Send,
  O: Render<F, D, Error = RE> + Send,
> Task<I, M, O> for LatestFrameTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    self.run(input, model, output).map(|_| ())
  }
}
