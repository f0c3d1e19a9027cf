use regex::Regex;
use telemetry_domain::{FilterRule, InternalError, PipelineError, Signal, TelemetryError, TransformRule};

const CONTEXTS: [&str; 8] = [
    "datapoint",
    "instrumentation_scope",
    "log",
    "metric",
    "resource",
    "scope",
    "span",
    "spanevent",
];

fn allowed_contexts(signal: Signal) -> &'static [&'static str] {
    match signal {
        Signal::Metrics => &["datapoint", "instrumentation_scope", "metric", "resource", "scope"],
        Signal::Traces => &["instrumentation_scope", "resource", "scope", "span", "spanevent"],
        Signal::Logs => &["instrumentation_scope", "log", "resource", "scope"],
    }
}

/// Static well-formedness checks for OTTL. The language itself is not
/// parsed; the checks catch what would make the collector refuse to start.
pub struct OttlValidator {
    signal: Signal,
    editor_call: Regex,
    context_path: Regex,
}

impl OttlValidator {
    pub fn new(signal: Signal) -> Result<Self, TelemetryError> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                InternalError::unknown(&format!("Invalid OTTL pattern: {e}"), Some("regex"))
            })
        };

        Ok(Self {
            signal,
            editor_call: compile(r"^[a-z][a-z0-9_]*\(")?,
            context_path: compile(&format!(r"(?:^|[^\w.])({})\.", CONTEXTS.join("|")))?,
        })
    }

    pub fn validate_transforms(&self, rules: &[TransformRule]) -> Result<(), TelemetryError> {
        for rule in rules {
            if rule.statements.is_empty() {
                return Err(PipelineError::ottl_spec_invalid(
                    "A transform rule needs at least one statement",
                    Some("empty_rule"),
                ));
            }
            for statement in &rule.statements {
                let masked = self.well_formed(statement)?;
                if !self.editor_call.is_match(masked.trim_start()) {
                    return Err(PipelineError::ottl_spec_invalid(
                        &format!("Statement `{statement}` does not start with an editor call"),
                        Some("not_a_statement"),
                    ));
                }
                self.check_contexts(statement, &masked)?;
            }
            for condition in &rule.conditions {
                self.validate_condition(condition)?;
            }
        }
        Ok(())
    }

    pub fn validate_filters(&self, rules: &[FilterRule]) -> Result<(), TelemetryError> {
        for rule in rules {
            if rule.conditions.is_empty() {
                return Err(PipelineError::ottl_spec_invalid(
                    "A filter rule needs at least one condition",
                    Some("empty_rule"),
                ));
            }
            for condition in &rule.conditions {
                self.validate_condition(condition)?;
            }
        }
        Ok(())
    }

    fn validate_condition(&self, condition: &str) -> Result<(), TelemetryError> {
        let masked = self.well_formed(condition)?;
        self.check_contexts(condition, &masked)
    }

    /// Returns `expression` with the contents of string literals blanked so
    /// later checks only see code.
    fn well_formed(&self, expression: &str) -> Result<String, TelemetryError> {
        if expression.trim().is_empty() {
            return Err(PipelineError::ottl_spec_invalid(
                "Expression is empty",
                Some("empty_expression"),
            ));
        }

        let mut masked = String::with_capacity(expression.len());
        let mut open: Vec<char> = Vec::new();
        let mut in_string = false;
        let mut escaped = false;

        for c in expression.chars() {
            if in_string {
                match c {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => in_string = false,
                    _ => {}
                }
                masked.push(if c == '"' && !in_string { '"' } else { ' ' });
                continue;
            }

            match c {
                '"' => in_string = true,
                '(' | '[' | '{' => open.push(c),
                ')' | ']' | '}' => {
                    let expected = match c {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    if open.pop() != Some(expected) {
                        return Err(unbalanced(expression));
                    }
                }
                _ => {}
            }
            masked.push(c);
        }

        if in_string {
            return Err(PipelineError::ottl_spec_invalid(
                &format!("Expression `{expression}` has an unterminated string"),
                Some("unterminated_string"),
            ));
        }
        if !open.is_empty() {
            return Err(unbalanced(expression));
        }

        Ok(masked)
    }

    fn check_contexts(&self, expression: &str, masked: &str) -> Result<(), TelemetryError> {
        let allowed = allowed_contexts(self.signal);
        for captures in self.context_path.captures_iter(masked) {
            let context = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
            if !allowed.contains(&context) {
                return Err(PipelineError::ottl_spec_invalid(
                    &format!(
                        "Expression `{expression}` uses the {context} context, which is not available for {}",
                        self.signal
                    ),
                    Some("invalid_context"),
                ));
            }
        }
        Ok(())
    }
}

fn unbalanced(expression: &str) -> TelemetryError {
    PipelineError::ottl_spec_invalid(
        &format!("Expression `{expression}` has unbalanced brackets"),
        Some("unbalanced_brackets"),
    )
}
