use crate::models::GenerateRequest;

const ROLE_FRAMING: &str = "You are an expert fashion photographer and retoucher producing catalog imagery for a leotard and dancewear shop.";

const CORE_TASK: &str = "Create a single photorealistic photograph of the model wearing the garment. The result must look like a real studio capture, never a collage, painting or illustration.";

const MODEL_FIDELITY: &str = "Preserve the model's identity exactly: face, hairstyle, skin tone and body proportions must match the model reference photo.";

const COLOR_PRESERVATION: &str = "Reproduce the garment faithfully, keeping its original colors, prints, fabric sheen and trim exactly as shown in the garment image.";

/// Builds the full natural-language directive for a generation request.
///
/// Pure function of the text and enum fields; the images themselves are
/// attached separately as inline parts. Sections are emitted in a fixed order
/// and optional sections are dropped entirely rather than left blank.
pub fn build_directive(req: &GenerateRequest) -> String {
    let palette = req.palette.as_deref().filter(|p| !p.is_empty());
    let instructions = req.instructions.trim();

    let sections: Vec<Option<String>> = vec![
        Some(ROLE_FRAMING.to_string()),
        Some(asset_legend(req.background_image.is_some())),
        Some(CORE_TASK.to_string()),
        Some(MODEL_FIDELITY.to_string()),
        req.age
            .phrase()
            .map(|p| format!("Adjust the apparent age so the model appears as {}.", p)),
        Some(garment_clause(palette)),
        Some(format!(
            "Pose the model in a relaxed, confident stance suitable for a catalog {}.",
            req.framing.phrase()
        )),
        Some(background_clause(req)),
        Some(format!(
            "Frame the final image at a {} aspect ratio.",
            req.aspect_ratio.phrase()
        )),
        (!instructions.is_empty()).then(|| format!("Additional instructions: {}", instructions)),
    ];

    sections.into_iter().flatten().collect::<Vec<_>>().join("\n\n")
}

fn asset_legend(has_background_image: bool) -> String {
    let mut legend = String::from(
        "You are given input images in this order: first the garment to showcase, second the model reference photo",
    );
    if has_background_image {
        legend.push_str(", third a background reference photo");
    }
    legend.push('.');
    legend
}

fn garment_clause(palette: Option<&[String]>) -> String {
    match palette {
        Some(colors) => format!(
            "When applying the garment, use only these colors: {}. Keep the cut, seams and trim of the garment unchanged.",
            colors.join(", ")
        ),
        None => COLOR_PRESERVATION.to_string(),
    }
}

fn background_clause(req: &GenerateRequest) -> String {
    if req.background_image.is_some() {
        "Use the attached background image as the backdrop, blending the model into it naturally.".to_string()
    } else {
        format!("The background must be strictly: '{}'.", req.background.preset_text())
    }
}
