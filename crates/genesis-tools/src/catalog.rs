//! The built-in tool catalog.
//!
//! Wires the standard multimodal tool set into a registry builder:
//!
//! | tool | edge | backing |
//! |---|---|---|
//! | `image_ocr` | IMAGE -> TEXT | `tesseract` |
//! | `image_overlay` | TEXT -> IMAGE | ImageMagick `convert` |
//! | `audio_denoise` | AUDIO -> AUDIO | `ffmpeg` afftdn filter |
//! | `audio_transcribe` | AUDIO -> TEXT | `whisper-cli` |
//! | `pdf_extract` | PDF -> TEXT | `pdftotext` |
//! | `translate` | TEXT -> TEXT | LLM provider |
//! | `save_text` / `load_text` | TEXT <-> TEXT_FILE | pure Rust |
//!
//! The command templates assume the binaries are on `PATH`; deployments
//! swap in their own [`CommandTool`] templates as needed.

use std::sync::Arc;

use genesis_core::RegistryBuilder;
use genesis_llm::Provider;
use genesis_types::{ParamKind, Result, ToolParam, ToolSpec, WorkflowType};

use crate::calc::{calculator_spec, CalculatorTool};
use crate::command::CommandTool;
use crate::text::{load_text_spec, save_text_spec, LoadTextTool, SaveTextTool};
use crate::translate::{translate_spec, TranslateTool};

fn image_ocr_spec() -> ToolSpec {
    ToolSpec {
        name: "image_ocr".into(),
        description: "Extract text from an image with OCR".into(),
        input_type: WorkflowType::Image,
        output_type: WorkflowType::Text,
        params: vec![
            ToolParam::required(
                "image",
                ParamKind::File {
                    file_type: WorkflowType::Image,
                },
                "The image to read",
            ),
            ToolParam::optional(
                "language",
                ParamKind::Str,
                "OCR language hint (tesseract lang code)",
                Some("eng+jpn".into()),
            ),
        ],
        preferred: 1,
    }
}

fn image_overlay_spec() -> ToolSpec {
    ToolSpec {
        name: "image_overlay".into(),
        description: "Draw caption text onto an image".into(),
        input_type: WorkflowType::Text,
        output_type: WorkflowType::Image,
        params: vec![
            ToolParam::required(
                "image",
                ParamKind::File {
                    file_type: WorkflowType::Image,
                },
                "The image to draw on",
            ),
            ToolParam::required(
                "caption_text",
                ParamKind::Str,
                "The caption to draw; must come from the user",
            ),
            ToolParam::optional(
                "font_size",
                ParamKind::Int,
                "Font size in points",
                Some(24.into()),
            ),
        ],
        preferred: 0,
    }
}

fn audio_denoise_spec() -> ToolSpec {
    ToolSpec {
        name: "audio_denoise".into(),
        description: "Remove background noise from an audio recording".into(),
        input_type: WorkflowType::Audio,
        output_type: WorkflowType::Audio,
        params: vec![ToolParam::required(
            "audio",
            ParamKind::File {
                file_type: WorkflowType::Audio,
            },
            "The audio file to clean",
        )],
        preferred: 1,
    }
}

fn audio_transcribe_spec() -> ToolSpec {
    ToolSpec {
        name: "audio_transcribe".into(),
        description: "Transcribe speech in an audio recording to text".into(),
        input_type: WorkflowType::Audio,
        output_type: WorkflowType::Text,
        params: vec![ToolParam::required(
            "audio",
            ParamKind::File {
                file_type: WorkflowType::Audio,
            },
            "The audio file to transcribe",
        )],
        preferred: 0,
    }
}

fn pdf_extract_spec() -> ToolSpec {
    ToolSpec {
        name: "pdf_extract".into(),
        description: "Extract the text content of a PDF document".into(),
        input_type: WorkflowType::Pdf,
        output_type: WorkflowType::Text,
        params: vec![ToolParam::required(
            "pdf",
            ParamKind::File {
                file_type: WorkflowType::Pdf,
            },
            "The PDF to extract",
        )],
        preferred: 0,
    }
}

/// Register the built-in tool set.
pub fn register_builtins(
    builder: &mut RegistryBuilder,
    provider: Arc<dyn Provider>,
) -> Result<()> {
    builder.register(
        image_ocr_spec(),
        Arc::new(CommandTool::new(
            "tesseract",
            vec!["{image}".into(), "{workspace}/ocr".into(), "-l".into(), "{language}".into()],
            "ocr.txt",
        )),
    )?;
    builder.register(
        image_overlay_spec(),
        Arc::new(CommandTool::new(
            "convert",
            vec![
                "{image}".into(),
                "-pointsize".into(),
                "{font_size}".into(),
                "-gravity".into(),
                "south".into(),
                "-annotate".into(),
                "+0+10".into(),
                "{caption_text}".into(),
                "{output}".into(),
            ],
            "overlaid.png",
        )),
    )?;
    builder.register(
        audio_denoise_spec(),
        Arc::new(CommandTool::new(
            "ffmpeg",
            vec![
                "-y".into(),
                "-i".into(),
                "{audio}".into(),
                "-af".into(),
                "afftdn".into(),
                "{output}".into(),
            ],
            "denoised.wav",
        )),
    )?;
    builder.register(
        audio_transcribe_spec(),
        Arc::new(CommandTool::new(
            "whisper-cli",
            vec![
                "-f".into(),
                "{audio}".into(),
                "-otxt".into(),
                "-of".into(),
                "{workspace}/transcript".into(),
            ],
            "transcript.txt",
        )),
    )?;
    builder.register(
        pdf_extract_spec(),
        Arc::new(CommandTool::new(
            "pdftotext",
            vec!["{pdf}".into(), "{output}".into()],
            "extracted.txt",
        )),
    )?;
    builder.register(translate_spec(), Arc::new(TranslateTool::new(provider)))?;
    builder.register(save_text_spec(), Arc::new(SaveTextTool))?;
    builder.register(load_text_spec(), Arc::new(LoadTextTool))?;

    builder.register_agent_tool(calculator_spec(), Arc::new(CalculatorTool))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use genesis_core::find_paths;
    use genesis_llm::ScriptedProvider;

    fn built() -> genesis_core::ToolRegistry {
        let mut builder = RegistryBuilder::new();
        register_builtins(&mut builder, Arc::new(ScriptedProvider::new(vec![]))).unwrap();
        builder.build()
    }

    #[test]
    fn registers_the_full_set_once() {
        let registry = built();
        assert_eq!(registry.len(), 8);
        assert!(registry.contains("image_ocr"));
        assert!(registry.contains("audio_denoise"));
        assert_eq!(registry.agent_tools().len(), 1);

        // Registering again collides on names.
        let mut builder = RegistryBuilder::new();
        register_builtins(&mut builder, Arc::new(ScriptedProvider::new(vec![]))).unwrap();
        assert!(
            register_builtins(&mut builder, Arc::new(ScriptedProvider::new(vec![]))).is_err()
        );
    }

    #[test]
    fn image_to_text_paths_exist() {
        let registry = built();
        let paths = find_paths(
            &registry,
            WorkflowType::Image,
            &[WorkflowType::Text, WorkflowType::TextFile],
            4,
            16,
        )
        .unwrap();
        let displays: Vec<String> = paths.iter().map(|p| p.display()).collect();
        assert!(displays.contains(&"image_ocr".to_string()));
        assert!(displays.contains(&"image_ocr -> translate".to_string()));
    }

    #[test]
    fn caption_scenario_path_exists() {
        let registry = built();
        let paths = find_paths(
            &registry,
            WorkflowType::Image,
            &[WorkflowType::Image],
            4,
            16,
        )
        .unwrap();
        assert!(paths
            .iter()
            .any(|p| p.display() == "image_ocr -> image_overlay"));
    }
}
