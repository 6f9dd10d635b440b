//! Parameter-shape descriptor

use std::fmt;

use garnet_ast::Params;
use serde::Serialize;

/// Canonical description of the arguments a callable accepts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Arity {
    /// Required parameters before the optional ones
    pub pre: usize,
    /// Optional parameters (with defaults)
    pub optional: usize,
    /// Whether a `*rest` parameter is declared
    pub has_rest: bool,
    /// Required parameters after the rest/optional ones
    pub post: usize,
    /// Keyword parameter names in declaration order
    pub keywords: Vec<String>,
    /// Whether a `**rest` parameter is declared
    pub has_keyword_rest: bool,
}

impl Arity {
    pub fn from_params(params: &Params) -> Self {
        let mut keywords: Vec<String> = Vec::with_capacity(params.keywords.len());
        for keyword in &params.keywords {
            let name = keyword.value.name.name.clone();
            if !keywords.contains(&name) {
                keywords.push(name);
            }
        }

        Self {
            pre: params.pre.len(),
            optional: params.optional.len(),
            has_rest: params.rest.is_some(),
            post: params.post.len(),
            keywords,
            has_keyword_rest: params.keyword_rest.is_some(),
        }
    }

    /// Number of positional arguments that must always be supplied.
    pub fn required(&self) -> usize {
        self.pre + self.post
    }

    /// Largest positional count accepted, `None` when a rest parameter takes the tail.
    pub fn maximum(&self) -> Option<usize> {
        if self.has_rest {
            None
        } else {
            Some(self.pre + self.optional + self.post)
        }
    }

    /// True when the callable reads a trailing keyword carrier.
    pub fn has_keywords(&self) -> bool {
        !self.keywords.is_empty() || self.has_keyword_rest
    }

    /// Whether `count` positional arguments satisfy this shape.
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.required() && self.maximum().map_or(true, |max| count <= max)
    }

    /// Blocks whose shape can never benefit from spreading a single array
    /// argument skip the auto-destructure check entirely.
    pub fn skips_auto_destructure(&self) -> bool {
        let trivially_positional = self.post == 0
            && self.optional == 0
            && self.pre <= 1
            && !self.has_rest
            && !self.has_keyword_rest;
        let lone_rest = self.has_rest && self.pre == 0 && self.optional == 0;
        trivially_positional || lone_rest
    }

    /// Minimum number of supplied positional values for the optional
    /// parameter at absolute position `index` to take a supplied value.
    /// Includes the keyword carrier slot when keywords are declared.
    pub fn optional_minimum(&self, index: usize) -> usize {
        let minimum = index + 1 + self.post;
        if self.has_keywords() {
            minimum + 1
        } else {
            minimum
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.required())?;
        match self.maximum() {
            Some(max) if max == self.required() => {}
            Some(max) => write!(f, "..{}", max)?,
            None => write!(f, "+")?,
        }
        if !self.keywords.is_empty() {
            write!(f, " [{}]", self.keywords.join(", "))?;
        }
        if self.has_keyword_rest {
            write!(f, " **")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garnet_ast::builder::*;

    #[test]
    fn test_arity_from_params() {
        // def m(a, b = 1, *c, d, e:, f: 2, **g, &h)
        let params = Params::new()
            .required("a")
            .optional("b", int(1))
            .rest("c")
            .post("d")
            .keyword("e", None)
            .keyword("f", Some(int(2)))
            .keyword_rest("g")
            .block_param("h");

        let arity = Arity::from_params(&params);
        assert_eq!(arity.pre, 1);
        assert_eq!(arity.optional, 1);
        assert!(arity.has_rest);
        assert_eq!(arity.post, 1);
        assert_eq!(arity.keywords, vec!["e".to_string(), "f".to_string()]);
        assert!(arity.has_keyword_rest);
        assert_eq!(arity.required(), 2);
        assert_eq!(arity.maximum(), None);
    }

    #[test]
    fn test_accepts() {
        let arity = Arity::from_params(&Params::new().required("a").optional("b", nil()));
        assert!(!arity.accepts(0));
        assert!(arity.accepts(1));
        assert!(arity.accepts(2));
        assert!(!arity.accepts(3));
    }

    #[test]
    fn test_optional_minimum_counts_keyword_carrier() {
        let plain = Arity::from_params(&Params::new().required("a").optional("b", nil()).post("c"));
        assert_eq!(plain.optional_minimum(1), 3);

        let with_keywords = Arity::from_params(
            &Params::new().required("a").optional("b", nil()).post("c").keyword("k", None),
        );
        assert_eq!(with_keywords.optional_minimum(1), 4);
    }

    #[test]
    fn test_auto_destructure_skip_rules() {
        let single = Arity::from_params(&Params::new().required("a"));
        assert!(single.skips_auto_destructure());

        let pair = Arity::from_params(&Params::new().required("a").required("b"));
        assert!(!pair.skips_auto_destructure());

        let lone_rest = Arity::from_params(&Params::new().rest("xs"));
        assert!(lone_rest.skips_auto_destructure());

        let rest_after_pre = Arity::from_params(&Params::new().required("a").rest("xs"));
        assert!(!rest_after_pre.skips_auto_destructure());

        let single_with_kwrest = Arity::from_params(&Params::new().required("a").keyword_rest("o"));
        assert!(!single_with_kwrest.skips_auto_destructure());
    }

    #[test]
    fn test_arity_display() {
        let fixed = Arity::from_params(&Params::new().required("a").required("b"));
        assert_eq!(fixed.to_string(), "2");

        let ranged = Arity::from_params(&Params::new().required("a").optional("b", nil()));
        assert_eq!(ranged.to_string(), "1..2");

        let open = Arity::from_params(&Params::new().rest("r").keyword("k", None));
        assert_eq!(open.to_string(), "0+ [k]");
    }
}
