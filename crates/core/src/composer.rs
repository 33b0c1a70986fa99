//! Turns the global template and a summary into the injected prompt.

use chat_summary_model::{
    Host, Injection, InjectionPosition, InjectionRole, PromptData,
};

/// The token in the template that is replaced by the summary.
pub const PLACEHOLDER: &str = "{{总结}}";

/// The key of the injection slot owned by the extension.
pub const INJECTION_KEY: &str = "custom_prompt_injector_main";

const INJECTION_DEPTH: u32 = 5000;

/// Composes the final prompt from the template and a summary.
///
/// A blank template passes the summary through unchanged. Otherwise every
/// placeholder in the template is replaced by the summary and the rest
/// of the template is kept verbatim.
pub fn compose(template: &str, summary: &str) -> String {
    if template.trim().is_empty() {
        return summary.to_owned();
    }
    template.replace(PLACEHOLDER, summary)
}

/// Builds the injection for a composed prompt.
///
/// A prompt that is blank after trimming yields an empty injection in
/// the same slot, so the slot is cleared rather than removed.
pub fn injection(final_text: &str) -> Injection {
    let content = if final_text.trim().is_empty() {
        String::new()
    } else {
        final_text.to_owned()
    };
    Injection {
        key: INJECTION_KEY.to_owned(),
        content,
        position: InjectionPosition::InChat,
        depth: INJECTION_DEPTH,
        scan: false,
        role: InjectionRole::System,
    }
}

/// Registers the composed prompt with the host.
pub fn apply(host: &dyn Host, final_text: &str) {
    let injection = injection(final_text);
    if injection.content.is_empty() {
        debug!("cleared the injection");
    } else {
        debug!("injected {} bytes", injection.content.len());
    }
    host.set_injection(injection);
}

/// Composes a summary with the host's current template and applies it.
pub fn apply_summary(host: &dyn Host, summary: &str) {
    let template = host.settings().template;
    apply(host, &compose(&template, summary));
}

/// Applies the summary stored in the active conversation's live metadata.
///
/// Call this on startup and whenever the active conversation changes.
pub fn apply_active(host: &dyn Host) {
    let data = PromptData::from_metadata(&host.live_metadata());
    trace!(
        "applying the summary of {:?}",
        host.active_chat().map(|chat| chat.id)
    );
    apply_summary(host, data.text());
}

#[cfg(test)]
mod tests {
    use chat_summary_model::{Metadata, OwnerRef};
    use chat_summary_test_host::TestHost;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_blank_template_passes_through() {
        assert_eq!(compose("", "Alice met Bob."), "Alice met Bob.");
        assert_eq!(compose(" \n\t", "Alice met Bob."), "Alice met Bob.");
        assert_eq!(compose("", ""), "");
    }

    #[test]
    fn test_replaces_every_placeholder() {
        let template = "<s>{{总结}}</s> again: {{总结}} {{other}}";
        assert_eq!(
            compose(template, "T"),
            "<s>T</s> again: T {{other}}"
        );
        assert_eq!(compose("no placeholder", "T"), "no placeholder");
    }

    #[test]
    fn test_wrapped_empty_summary_is_still_injected() {
        let composed = compose("<summary>{{总结}}</summary>", "");
        assert_eq!(composed, "<summary></summary>");
        assert_eq!(injection(&composed).content, "<summary></summary>");
    }

    #[test]
    fn test_blank_prompt_clears_slot() {
        let injection = injection("  \n ");
        assert_eq!(injection.key, INJECTION_KEY);
        assert_eq!(injection.content, "");
        assert_eq!(injection.role, InjectionRole::System);
        assert_eq!(injection.position, InjectionPosition::InChat);
    }

    #[test]
    fn test_clearing_is_idempotent() {
        let owner = OwnerRef::Group {
            id: "g1".to_owned(),
        };
        let mut metadata = Metadata::new();
        PromptData {
            prompt: Some("S1".to_owned()),
            ..Default::default()
        }
        .write_to(&mut metadata);
        let host = TestHost::new(owner, "Crew").with_active_chat(
            "Crew - 1",
            metadata,
            vec![],
        );

        apply_active(&host);
        assert_eq!(host.injected_text().as_deref(), Some("S1"));

        host.update_metadata(
            chat_summary_model::METADATA_KEY,
            json!({ "prompt": "" }),
        );
        apply_active(&host);
        apply_active(&host);

        let injections = host.injections();
        assert_eq!(injections.len(), 3);
        assert!(injections.iter().all(|i| i.key == INJECTION_KEY));
        assert_eq!(host.injected_text().as_deref(), Some(""));
    }
}
