//! CSS selector parsing and matching
//!
//! Supports the subset delegation needs: compound selectors made of a tag,
//! `*`, `#id`, `.class`, `[attr]` and `[attr=value]`, joined into lists with
//! commas. Combinators (descendant, child, sibling) and pseudo-classes are
//! rejected.
//!
//! ```rust
//! use weave_dom::{Element, Selector};
//!
//! let selector = Selector::parse("li.todo[data-id], .destroy").unwrap();
//! let item = Element::new("li").with_class("todo").with_attribute("data-id", "3");
//! assert!(selector.matches(&item));
//! ```

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{all_consuming, map, opt, value},
    multi::{many1, separated_list1},
    sequence::{delimited, preceded},
    Finish, IResult,
};
use std::fmt;
use std::str::FromStr;

use crate::element::Element;
use crate::error::SelectorError;

/// Attribute condition: presence, or exact value
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeSelector {
    pub name: String,
    pub value: Option<String>,
}

/// One selector without combinators, e.g. `li.todo.completed`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompoundSelector {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: Vec<AttributeSelector>,
}

impl CompoundSelector {
    pub fn matches(&self, element: &Element) -> bool {
        // The document root is never a match target
        if element.tag().starts_with('#') {
            return false;
        }
        if let Some(tag) = &self.tag {
            if !element.tag().eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.dom_id().as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|class| element.has_class(class)) {
            return false;
        }
        self.attributes.iter().all(|attr| match &attr.value {
            Some(expected) => element.attribute(&attr.name).as_deref() == Some(expected.as_str()),
            None => element.has_attribute(&attr.name),
        })
    }
}

/// A parsed selector list
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<CompoundSelector>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(SelectorError::Empty);
        }

        match all_consuming(selector_list)(trimmed).finish() {
            Ok((_, alternatives)) => Ok(Self {
                source: trimmed.to_string(),
                alternatives,
            }),
            Err(err) => Err(SelectorError::Invalid {
                selector: trimmed.to_string(),
                offset: trimmed.len() - err.input.len(),
            }),
        }
    }

    /// The selector text as written (trimmed)
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn alternatives(&self) -> &[CompoundSelector] {
        &self.alternatives
    }

    /// True if any alternative matches the element
    pub fn matches(&self, element: &Element) -> bool {
        self.alternatives.iter().any(|alt| alt.matches(element))
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum SimpleSelector {
    Universal,
    Tag(String),
    Id(String),
    Class(String),
    Attribute(AttributeSelector),
}

/// Parse an identifier (alphanumeric, hyphen, underscore)
fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '-' || c == '_')(input)
}

/// Parse an attribute value: quoted string or bare identifier
fn attribute_value(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
        delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
        identifier,
    ))(input)
}

/// Parse `[name]` or `[name=value]`
fn attribute(input: &str) -> IResult<&str, AttributeSelector> {
    let (input, _) = char('[')(input)?;
    let (input, name) = delimited(multispace0, identifier, multispace0)(input)?;
    let (input, value) = opt(preceded(
        char('='),
        delimited(multispace0, attribute_value, multispace0),
    ))(input)?;
    let (input, _) = char(']')(input)?;

    Ok((
        input,
        AttributeSelector {
            name: name.to_string(),
            value: value.map(str::to_string),
        },
    ))
}

fn simple_selector(input: &str) -> IResult<&str, SimpleSelector> {
    alt((
        value(SimpleSelector::Universal, char('*')),
        map(preceded(char('#'), identifier), |id: &str| {
            SimpleSelector::Id(id.to_string())
        }),
        map(preceded(char('.'), identifier), |class: &str| {
            SimpleSelector::Class(class.to_string())
        }),
        map(attribute, SimpleSelector::Attribute),
        map(identifier, |tag: &str| {
            SimpleSelector::Tag(tag.to_ascii_lowercase())
        }),
    ))(input)
}

fn compound_selector(input: &str) -> IResult<&str, CompoundSelector> {
    map(many1(simple_selector), |parts| {
        let mut compound = CompoundSelector::default();
        for part in parts {
            match part {
                SimpleSelector::Universal => {}
                SimpleSelector::Tag(tag) => compound.tag = Some(tag),
                SimpleSelector::Id(id) => compound.id = Some(id),
                SimpleSelector::Class(class) => compound.classes.push(class),
                SimpleSelector::Attribute(attr) => compound.attributes.push(attr),
            }
        }
        compound
    })(input)
}

fn selector_list(input: &str) -> IResult<&str, Vec<CompoundSelector>> {
    separated_list1(
        delimited(multispace0, char(','), multispace0),
        compound_selector,
    )(input)
}
