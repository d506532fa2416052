//! Built-in node kinds

use super::{KindSpec, PortSpec};
use crate::core::{PortType, Value};
use serde_json::json;

pub(super) fn kinds() -> Vec<KindSpec> {
    vec![
        // Sources
        KindSpec::source("prompt", "text", PortSpec::required("text", PortType::Text)),
        KindSpec::source("image", "url", PortSpec::required("image", PortType::Image)),
        KindSpec::source("video", "url", PortSpec::required("video", PortType::Video)),
        KindSpec::source("audio", "url", PortSpec::required("audio", PortType::Audio)),
        // Generation
        KindSpec::generation("text_to_image")
            .input(PortSpec::required("prompt", PortType::Text))
            .input(PortSpec::optional("negative_prompt", PortType::Text))
            .output(PortSpec::required("image", PortType::Image))
            .param("model", json!("default"))
            .param("width", json!(1024))
            .param("height", json!(1024)),
        KindSpec::generation("image_to_video")
            .input(PortSpec::required("image", PortType::Image))
            .input(PortSpec::optional("prompt", PortType::Text))
            .output(PortSpec::required("video", PortType::Video))
            .param("model", json!("default"))
            .param("duration", json!(5)),
        KindSpec::generation("upscale")
            .input(PortSpec::required("image", PortType::Image))
            .input(PortSpec::optional("scale", PortType::Number).with_default(Value::Number(2.0)))
            .output(PortSpec::required("image", PortType::Image)),
        KindSpec::generation("inpaint")
            .input(PortSpec::required("image", PortType::Image))
            .input(PortSpec::required("mask", PortType::Image))
            .input(PortSpec::required("prompt", PortType::Text))
            .output(PortSpec::required("image", PortType::Image))
            .param("strength", json!(0.8)),
        KindSpec::generation("lipsync")
            .input(PortSpec::required("audio", PortType::Audio))
            .input(PortSpec::optional("image", PortType::Image))
            .input(PortSpec::optional("video", PortType::Video))
            .any_of(&["image", "video"])
            .output(PortSpec::required("video", PortType::Video))
            .param("model", json!("default")),
        KindSpec::generation("text_to_speech")
            .input(PortSpec::required("text", PortType::Text))
            .output(PortSpec::required("audio", PortType::Audio))
            .param("voice", json!("default")),
        KindSpec::generation("transcribe")
            .input(PortSpec::required("audio", PortType::Audio))
            .output(PortSpec::required("text", PortType::Text))
            .param("language", json!("auto")),
        KindSpec::generation("translate")
            .input(PortSpec::required("text", PortType::Text))
            .output(PortSpec::required("text", PortType::Text))
            .param("target_language", json!("en")),
        KindSpec::generation("dub")
            .input(PortSpec::required("video", PortType::Video))
            .output(PortSpec::required("video", PortType::Video))
            .param("target_language", json!("en"))
            .param("voice", json!("default")),
        // Sinks
        KindSpec::sink("preview"),
    ]
}
