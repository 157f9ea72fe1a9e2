//! Application Ports - 出站端口定义
//!
//! 定义本 crate 与外部推理实现之间的抽象接口

mod speech_model;

pub use speech_model::{
    GenerateRequest, GenerationParams, ModelError, ModelLoaderPort, PromptHandle,
    SpeechModelPort,
};
