pub trait StringExt {
    fn snake_case(&self) -> String;
    /// Uppercases and folds every run of characters outside `[A-Za-z0-9]`
    /// into a single `_`, so the result can be used as an environment
    /// variable name. A leading character that is not a letter gets an `X`
    /// prepended.
    fn env_var_case(&self) -> String;
}

impl StringExt for String {
    fn snake_case(&self) -> String {
        let mut snake_case = String::new();

        for (i, c) in self.chars().enumerate() {
            if c.is_ascii_uppercase() && i > 0 {
                snake_case.push('_');
                snake_case.push(c.to_ascii_lowercase());
            } else {
                snake_case.push(c.to_ascii_lowercase());
            }
        }

        snake_case
    }

    fn env_var_case(&self) -> String {
        let mut env_var = String::with_capacity(self.len());
        let mut in_separator = false;

        for c in self.chars() {
            if c.is_ascii_alphanumeric() {
                env_var.push(c.to_ascii_uppercase());
                in_separator = false;
            } else if !in_separator {
                env_var.push('_');
                in_separator = true;
            }
        }

        match env_var.chars().next() {
            Some(first) if first.is_ascii_alphabetic() => env_var,
            _ => format!("X{env_var}"),
        }
    }
}

impl<'a> StringExt for &'a str {
    fn snake_case(&self) -> String {
        self.to_string().snake_case()
    }

    fn env_var_case(&self) -> String {
        self.to_string().env_var_case()
    }
}
