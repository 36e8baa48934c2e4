//! `check`: validate bindings and print the resolved topology.

use super::*;

pub(super) fn cmd_check(decls: &Declarations, json: bool) -> Result<()> {
    let plan = registry::plan(&decls.bindings)?;

    if json {
        let output = CheckOutput {
            config_file: decls.source.as_ref().map(|p| p.display().to_string()),
            inputs: plan
                .inputs()
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            payloads: plan.payload_count(),
            bindings: plan
                .bindings()
                .iter()
                .map(|b| BindingJson {
                    name: b.name.clone(),
                    keyboard_led: b.indicator,
                    input_device: plan.input_path(b.input).display().to_string(),
                    led_device: b.output_path.display().to_string(),
                    brightness_on: b.on_payload.value(),
                    brightness_off: b.off_payload.value(),
                })
                .collect(),
        };
        let s = serde_json::to_string_pretty(&output)
            .map_err(|e| keyledd_lib::KeyleddError::Config(format!("JSON serialization: {e}")))?;
        println!("{s}");
        return Ok(());
    }

    let w = kv_width(
        &["Config file:", "Inputs:", "Bindings:"],
        &["Indicator:", "Input:", "Output:", "Brightness:"],
    );
    let source = decls
        .source
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none)".into());
    kv("Config file:", source, w);
    kv("Inputs:", plan.inputs().len(), w);
    kv("Bindings:", plan.bindings().len(), w);

    for b in plan.bindings() {
        println!();
        println!("{}", b.name);
        kv_indent("Indicator:", b.indicator, w);
        kv_indent("Input:", plan.input_path(b.input).display(), w);
        kv_indent("Output:", b.output_path.display(), w);
        kv_indent(
            "Brightness:",
            format!(
                "{} on / {} off",
                b.on_payload.value(),
                b.off_payload.value()
            ),
            w,
        );
    }
    Ok(())
}
