// 该文件是 Shanan （山南西风） 项目的一部分。
// tests/pipeline.rs - 端到端后处理测试
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

use std::sync::Mutex;

use serde_json::{Value, json};
use url::Url;

use shanan_post::{
  FromUrl,
  detection::DetectResult,
  frame::{FrameError, RawFrame},
  input::InputWrapper,
  model::{Labels, Model, PostprocessBuilder, Postprocessor, TensorLayout},
  output::{OutputWrapper, Render},
  task::{ContinuousTask, Task},
};

const NUM_CLASSES: usize = 3;
const CHANNELS: usize = 5 + NUM_CLASSES;

fn close(a: f32, b: f32) -> bool {
  (a - b).abs() < 1e-3
}

fn labels() -> Labels {
  ["person", "bicycle", "car"].into_iter().collect()
}

/// 一个框：中心、宽高、目标 logit、各类别 logit
struct Raw {
  cx: f32,
  cy: f32,
  w: f32,
  h: f32,
  obj: f32,
  cls: [f32; NUM_CLASSES],
}

impl Raw {
  fn channels(&self) -> [f32; CHANNELS] {
    let mut out = [0.0; CHANNELS];
    out[..5].copy_from_slice(&[self.cx, self.cy, self.w, self.h, self.obj]);
    out[5..].copy_from_slice(&self.cls);
    out
  }
}

fn encode(layout: TensorLayout, boxes: &[Raw]) -> Vec<f32> {
  let n = boxes.len();
  let (box_stride, channel_stride) = layout.strides(n, CHANNELS);
  let mut tensor = vec![0.0; n * CHANNELS];
  for (i, raw) in boxes.iter().enumerate() {
    for (c, v) in raw.channels().iter().enumerate() {
      tensor[i * box_stride + c * channel_stride] = *v;
    }
  }
  tensor
}

fn postprocessor(num_boxes: usize) -> Postprocessor {
  PostprocessBuilder::default()
    .labels(labels())
    .shape(&[1, CHANNELS, num_boxes])
    .build()
    .unwrap()
}

#[test]
fn hd_frame_box_lands_in_source_pixels() {
  let boxes = [Raw { cx: 320.0, cy: 320.0, w: 100.0, h: 100.0, obj: 8.0, cls: [-8.0, -8.0, 8.0] }];
  let tensor = encode(TensorLayout::ChannelMajor, &boxes);

  let result = postprocessor(1).process(&tensor, 1280.0, 720.0).unwrap();
  assert_eq!(result.len(), 1);
  let det = result.top().unwrap();
  assert_eq!(det.bbox(), [540.0, 260.0, 740.0, 460.0]);
  assert_eq!(result.label(det), "car");
}

#[test]
fn overlapping_boxes_keep_the_stronger_one() {
  // 左框 [0,0,80,100]，右框 [20,0,100,100]，交并比 0.6
  let boxes = [
    Raw { cx: 40.0, cy: 50.0, w: 80.0, h: 100.0, obj: 8.0, cls: [2.0, -8.0, -8.0] },
    Raw { cx: 60.0, cy: 50.0, w: 80.0, h: 100.0, obj: 8.0, cls: [8.0, -8.0, -8.0] },
    Raw { cx: 400.0, cy: 400.0, w: 50.0, h: 50.0, obj: 8.0, cls: [-8.0, 1.0, -8.0] },
  ];
  let tensor = encode(TensorLayout::ChannelMajor, &boxes);

  let result = postprocessor(3).process(&tensor, 640.0, 640.0).unwrap();
  let kept: Vec<[f32; 4]> = result.iter().map(|d| d.bbox()).collect();
  assert_eq!(kept, vec![[20.0, 0.0, 100.0, 100.0], [375.0, 375.0, 425.0, 425.0]]);
  assert!(result.iter().all(|d| d.score() > 0.4));
}

#[test]
fn layouts_decode_to_the_same_result() {
  let boxes = [
    Raw { cx: 100.0, cy: 120.0, w: 60.0, h: 40.0, obj: 5.0, cls: [3.0, 0.0, 0.0] },
    Raw { cx: 0.25, cy: 0.75, w: 0.1, h: 0.2, obj: 4.0, cls: [0.0, 0.0, 6.0] },
    Raw { cx: 500.0, cy: 300.0, w: 90.0, h: 90.0, obj: -5.0, cls: [6.0, 0.0, 0.0] },
  ];
  let channel_major = PostprocessBuilder::default()
    .labels(labels())
    .boxes(3, TensorLayout::ChannelMajor)
    .build()
    .unwrap();
  let box_major = PostprocessBuilder::default()
    .labels(labels())
    .boxes(3, TensorLayout::BoxMajor)
    .build()
    .unwrap();

  let a = channel_major
    .process(&encode(TensorLayout::ChannelMajor, &boxes), 1920.0, 1080.0)
    .unwrap();
  let b = box_major
    .process(&encode(TensorLayout::BoxMajor, &boxes), 1920.0, 1080.0)
    .unwrap();
  assert_eq!(a, b);
  assert_eq!(a.len(), 2);
}

#[test]
fn nothing_above_threshold_is_empty() {
  let boxes = [
    Raw { cx: 320.0, cy: 320.0, w: 100.0, h: 100.0, obj: -3.0, cls: [8.0, 0.0, 0.0] },
    Raw { cx: 100.0, cy: 100.0, w: 50.0, h: 50.0, obj: 8.0, cls: [-3.0, -3.0, -3.0] },
  ];
  let tensor = encode(TensorLayout::ChannelMajor, &boxes);
  assert!(postprocessor(2).process(&tensor, 640.0, 480.0).unwrap().is_empty());
  assert!(postprocessor(0).process(&[], 640.0, 480.0).unwrap().is_empty());
}

#[test]
fn frame_errors() {
  let post = postprocessor(2);
  assert_eq!(
    post.process(&[0.0; 5], 640.0, 480.0),
    Err(FrameError::TensorShapeMismatch { expected: 2 * CHANNELS, actual: 5 })
  );
  assert!(matches!(
    post.infer(&RawFrame::new(vec![0.0; 2 * CHANNELS], 0.0, 480.0)),
    Err(FrameError::InvalidGeometry { .. })
  ));
}

#[derive(Default)]
struct Recorder(Mutex<Vec<usize>>);

#[derive(Debug, thiserror::Error)]
#[error("never")]
struct Never;

impl Render<RawFrame, DetectResult> for &Recorder {
  type Error = Never;

  fn render_result(&self, _frame: &RawFrame, result: &DetectResult) -> Result<(), Never> {
    self.0.lock().unwrap().push(result.len());
    Ok(())
  }
}

#[test]
fn continuous_task_survives_a_bad_frame() {
  let boxes = [Raw { cx: 320.0, cy: 320.0, w: 100.0, h: 100.0, obj: 8.0, cls: [8.0, 0.0, 0.0] }];
  let good = encode(TensorLayout::ChannelMajor, &boxes);
  let frames = vec![
    RawFrame::new(good.clone(), 1280.0, 720.0),
    RawFrame::new(vec![0.0; 3], 1280.0, 720.0),
    RawFrame::new(good, 1280.0, 720.0),
  ];

  let recorder = Recorder::default();
  ContinuousTask::default()
    .run_task(frames.into_iter(), postprocessor(1), &recorder)
    .unwrap();
  assert_eq!(*recorder.0.lock().unwrap(), vec![1, 0, 1]);
}

#[test]
fn url_configured_pipeline_writes_json_lines() {
  let dir = std::env::temp_dir().join(format!("shanan-post-pipeline-{}", std::process::id()));
  let _ = std::fs::remove_dir_all(&dir);
  std::fs::create_dir_all(&dir).unwrap();
  let labels_path = dir.join("labels.txt");
  let frames_path = dir.join("frames.jsonl");
  let output_path = dir.join("out").join("result.jsonl");

  std::fs::write(&labels_path, "person\nbicycle\n\ncar\n").unwrap();
  let boxes = [Raw { cx: 0.5, cy: 0.5, w: 0.15625, h: 0.15625, obj: 8.0, cls: [-8.0, 8.0, -8.0] }];
  let tensor = encode(TensorLayout::BoxMajor, &boxes);
  let frames = [
    json!({ "width": 1280, "height": 720, "tensor": tensor }),
    json!({ "width": 1280, "height": 720, "tensor": [0.0] }),
  ];
  let text: String = frames.iter().map(|f| format!("{}\n", f)).collect();
  std::fs::write(&frames_path, text).unwrap();

  let model_url = Url::parse(&format!(
    "yolo://{}?shape=1,1,{}&layout=box-major&iou=0.45&max_det=5",
    labels_path.display(),
    CHANNELS
  ))
  .unwrap();
  let input_url = Url::parse(&format!("jsonl://{}", frames_path.display())).unwrap();
  let output_url = Url::parse(&format!("jsonl://{}", output_path.display())).unwrap();

  let model = PostprocessBuilder::from_url(&model_url).unwrap().build().unwrap();
  assert_eq!(model.labels().len(), 3);
  let input = InputWrapper::from_url(&input_url).unwrap();
  let output = OutputWrapper::from_url(&output_url).unwrap();
  ContinuousTask::default().run_task(input, model, output).unwrap();

  let written = std::fs::read_to_string(&output_path).unwrap();
  let lines: Vec<Value> = written
    .lines()
    .map(|line| serde_json::from_str(line).unwrap())
    .collect();
  assert_eq!(lines.len(), 2);
  let det = &lines[0]["detections"][0];
  assert_eq!(det["label"], "bicycle");
  assert_eq!(det["class_id"], 1);
  let bbox: Vec<f32> = det["bbox"]
    .as_array()
    .unwrap()
    .iter()
    .map(|v| v.as_f64().unwrap() as f32)
    .collect();
  assert!(bbox.iter().zip([540.0, 260.0, 740.0, 460.0]).all(|(a, b)| close(*a, b)));
  assert_eq!(lines[1]["detections"].as_array().map(Vec::len), Some(0));

  std::fs::remove_dir_all(&dir).unwrap();
}
