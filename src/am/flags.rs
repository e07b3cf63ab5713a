//! Command-string assembly for the address-management tool.
//!
//! Every request is a sequence of `-name=value` tokens. Empty values are
//! dropped so callers can fill a request struct and only the fields that
//! carry something end up on the command line. The line is run by `sh`, so
//! any value with a character outside [`is_shell_safe`] goes out
//! double-quoted.

use std::fmt;

/// A single flag value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagValue {
    /// `-name=value`, omitted when empty, quoted unless shell-safe
    Text(String),
    /// `-name="value"`, always emitted (the tool expects `-Descr=""`)
    Quoted(String),
    /// `-name='a','b'`, omitted when empty
    Multi(Vec<String>),
    /// bare `-name`
    Switch,
}

impl FlagValue {
    fn render(&self, name: &str) -> Option<String> {
        match self {
            FlagValue::Text(value) if value.is_empty() => None,
            FlagValue::Text(value) if is_shell_safe(value) => Some(format!("-{}={}", name, value)),
            FlagValue::Text(value) => Some(format!("-{}={}", name, double_quote(value))),
            FlagValue::Quoted(value) => Some(format!("-{}={}", name, double_quote(value))),
            FlagValue::Multi(values) if values.is_empty() => None,
            FlagValue::Multi(values) => {
                let joined = values
                    .iter()
                    .map(|v| format!("'{}'", v.replace('\'', "")))
                    .collect::<Vec<_>>()
                    .join(",");
                Some(format!("-{}={}", name, joined))
            }
            FlagValue::Switch => Some(format!("-{}", name)),
        }
    }
}

/// True when `sh` reads `value` as one literal word.
pub fn is_shell_safe(value: &str) -> bool {
    value.chars().all(|c| {
        c.is_ascii_alphanumeric()
            || matches!(c, '.' | '_' | '-' | '/' | ':' | ',' | '@' | '%' | '+' | '=')
    })
}

/// Wrap a value in double quotes for `sh`, escaping the characters that are
/// still special inside them.
pub fn double_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Ordered flag list for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandFlags {
    flags: Vec<(String, FlagValue)>,
}

impl CommandFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request for the given tool function (`-function=<name>`).
    pub fn function(name: &str) -> Self {
        Self::new().text("function", name)
    }

    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.flags.push((name.to_string(), FlagValue::Text(value.into())));
        self
    }

    pub fn quoted(mut self, name: &str, value: impl Into<String>) -> Self {
        self.flags.push((name.to_string(), FlagValue::Quoted(value.into())));
        self
    }

    /// Selection tags: a lone tag goes out as plain text, several as a list.
    pub fn tags(self, name: &str, tags: &[String]) -> Self {
        match tags {
            [single] => self.text(name, single.clone()),
            _ => self.multi(name, tags.iter().cloned()),
        }
    }

    pub fn multi<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.flags.push((name.to_string(), FlagValue::Multi(values)));
        self
    }

    pub fn switch(mut self, name: &str) -> Self {
        self.flags.push((name.to_string(), FlagValue::Switch));
        self
    }

    /// Append a text flag only when `condition` holds.
    pub fn text_if(self, condition: bool, name: &str, value: impl Into<String>) -> Self {
        if condition {
            self.text(name, value)
        } else {
            self
        }
    }

    pub fn get(&self, name: &str) -> Option<&FlagValue> {
        self.flags.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn render(&self) -> String {
        self.flags
            .iter()
            .filter_map(|(name, value)| value.render(name))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for CommandFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_flags_are_dropped() {
        let flags = CommandFlags::function("next-avail")
            .text("subnet", "10.34.182.128/27")
            .text("addressblock", "")
            .text("type", "I")
            .text("return", "1");

        assert_eq!(
            flags.render(),
            "-function=next-avail -subnet=10.34.182.128/27 -type=I -return=1"
        );
    }

    #[test]
    fn test_quoted_flags_are_always_emitted() {
        let flags = CommandFlags::function("int-add")
            .text("name", "script-test2")
            .quoted("Descr", "");

        assert_eq!(flags.render(), "-function=int-add -name=script-test2 -Descr=\"\"");
    }

    #[test]
    fn test_multi_value_flag() {
        let flags = CommandFlags::function("scope-mod")
            .quoted("name", "branch-01")
            .multi("SelectionTags", ["IPPhones", "OtherDevices"]);

        assert_eq!(
            flags.render(),
            "-function=scope-mod -name=\"branch-01\" -SelectionTags='IPPhones','OtherDevices'"
        );
    }

    #[test]
    fn test_empty_multi_and_switches() {
        let flags = CommandFlags::new()
            .switch("comma")
            .text("function", "int-find")
            .multi("SelectionTags", Vec::<String>::new());

        assert_eq!(flags.render(), "-comma -function=int-find");
    }

    #[test]
    fn test_double_quote_escapes_shell_specials() {
        assert_eq!(double_quote("San Jose"), "\"San Jose\"");
        assert_eq!(double_quote("p\"a$s`s\\"), "\"p\\\"a\\$s\\`s\\\\\"");
    }

    #[test]
    fn test_text_quotes_only_when_needed() {
        let flags = CommandFlags::function("subnet-add")
            .text("City", "San Jose")
            .text("Area", "HQ")
            .text("lab", "");

        assert_eq!(flags.render(), "-function=subnet-add -City=\"San Jose\" -Area=HQ");
    }

    #[test]
    fn test_host_names_cannot_break_out_of_the_value() {
        let flags = CommandFlags::function("int-add")
            .text("name", "branch 01")
            .text("hostname", "x;touch /tmp/owned;#")
            .text("ipaddress", "2001:420:30a:200::a10");

        assert_eq!(
            flags.render(),
            "-function=int-add -name=\"branch 01\" -hostname=\"x;touch /tmp/owned;#\" \
             -ipaddress=2001:420:30a:200::a10"
        );
        assert!(is_shell_safe("printer-01.example.com"));
        assert!(!is_shell_safe("$(reboot)"));
        assert!(!is_shell_safe("dhcp-sjc*"));
    }

    #[test]
    fn test_tags() {
        let one = vec!["OtherDevices".to_string()];
        let two = vec!["IPPhones".to_string(), "OtherDevices".to_string()];

        assert_eq!(CommandFlags::new().tags("SelectionTags", &one).render(), "-SelectionTags=OtherDevices");
        assert_eq!(
            CommandFlags::new().tags("SelectionTags", &two).render(),
            "-SelectionTags='IPPhones','OtherDevices'"
        );
        assert_eq!(CommandFlags::new().tags("SelectionTags", &[]).render(), "");
    }

    #[test]
    fn test_conditional_and_lookup() {
        let flags = CommandFlags::function("next-avail")
            .text_if(false, "length", "29")
            .text_if(true, "return", "all");

        assert_eq!(flags.get("length"), None);
        assert_eq!(flags.get("return"), Some(&FlagValue::Text("all".to_string())));
    }
}
