//! Typed Bear action requests.
//!
//! Every Bear x-callback-url action is one variant of [`ActionRequest`], each
//! carrying its own parameter struct. The same structs double as MCP tool
//! parameter schemas, so identifiers that Bear treats as "required" are kept
//! as `Option` here and checked in [`ActionRequest::validate`]. That way a
//! missing field surfaces as `InvalidParameters` instead of a decoding error.

use std::fmt;

use schemars::JsonSchema;
use serde::Deserialize;

use super::url::QueryParams;
use super::BearError;

/// The Bear actions this crate knows how to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    OpenNote,
    Create,
    AddText,
    AddFile,
    Tags,
    OpenTag,
    RenameTag,
    DeleteTag,
    Trash,
    Archive,
    Untagged,
    Todo,
    Today,
    Locked,
    Search,
    GrabUrl,
}

impl Action {
    pub const ALL: [Action; 16] = [
        Action::OpenNote,
        Action::Create,
        Action::AddText,
        Action::AddFile,
        Action::Tags,
        Action::OpenTag,
        Action::RenameTag,
        Action::DeleteTag,
        Action::Trash,
        Action::Archive,
        Action::Untagged,
        Action::Todo,
        Action::Today,
        Action::Locked,
        Action::Search,
        Action::GrabUrl,
    ];

    /// Path segment after `bear://x-callback-url/`.
    pub fn path(self) -> &'static str {
        match self {
            Action::OpenNote => "open-note",
            Action::Create => "create",
            Action::AddText => "add-text",
            Action::AddFile => "add-file",
            Action::Tags => "tags",
            Action::OpenTag => "open-tag",
            Action::RenameTag => "rename-tag",
            Action::DeleteTag => "delete-tag",
            Action::Trash => "trash",
            Action::Archive => "archive",
            Action::Untagged => "untagged",
            Action::Todo => "todo",
            Action::Today => "today",
            Action::Locked => "locked",
            Action::Search => "search",
            Action::GrabUrl => "grab-url",
        }
    }

    /// MCP tool name for this action (`rename-tag` becomes `rename_tag`).
    pub fn tool_name(self) -> String {
        self.path().replace('-', "_")
    }

    /// Whether Bear's `x-success` reply carries data we need to wait for.
    ///
    /// Tag management and trash/archive only change state, so they are sent
    /// without a callback and acknowledged immediately.
    pub fn expects_callback(self) -> bool {
        !matches!(
            self,
            Action::RenameTag | Action::DeleteTag | Action::Trash | Action::Archive
        )
    }

    /// Flags that keep Bear in the background for this action.
    pub fn background_flags(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Action::OpenNote => &[
                ("new_window", "no"),
                ("float", "no"),
                ("show_window", "no"),
                ("open_note", "no"),
                ("selected", "no"),
                ("edit", "no"),
            ],
            Action::Create => &[
                ("open_note", "no"),
                ("new_window", "no"),
                ("float", "no"),
                ("show_window", "no"),
            ],
            Action::AddText => &[
                ("open_note", "no"),
                ("new_window", "no"),
                ("show_window", "no"),
                ("edit", "no"),
            ],
            Action::AddFile => &[
                ("selected", "no"),
                ("open_note", "no"),
                ("new_window", "no"),
                ("show_window", "no"),
                ("edit", "no"),
            ],
            Action::RenameTag
            | Action::DeleteTag
            | Action::Trash
            | Action::Archive
            | Action::Untagged
            | Action::Todo
            | Action::Today
            | Action::Locked
            | Action::Search => &[("show_window", "no")],
            Action::Tags | Action::OpenTag | Action::GrabUrl => &[],
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

// ============== Parameter Types ==============

/// How `add-text` applies its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TextMode {
    Prepend,
    Append,
    /// Replace the body, keeping the title.
    Replace,
    /// Replace the whole note, title included.
    ReplaceAll,
}

impl TextMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TextMode::Prepend => "prepend",
            TextMode::Append => "append",
            TextMode::Replace => "replace",
            TextMode::ReplaceAll => "replace_all",
        }
    }
}

/// Where `add-file` places the attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FileMode {
    Prepend,
    Append,
}

impl FileMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FileMode::Prepend => "prepend",
            FileMode::Append => "append",
        }
    }
}

/// Parameters for `open-note`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct OpenNote {
    /// Bear note identifier.
    #[schemars(description = "Note unique identifier")]
    pub id: Option<String>,

    /// Exact note title.
    #[schemars(description = "Note title")]
    pub title: Option<String>,

    /// Search term; the first match is opened.
    #[schemars(description = "Open the first note matching this search term")]
    pub search: Option<String>,

    /// Header to scroll to.
    #[schemars(description = "Header inside the note to scroll to")]
    pub header: Option<String>,

    /// Whether trashed notes are skipped.
    #[schemars(description = "Skip notes that are in the trash")]
    pub exclude_trashed: Option<bool>,
}

/// Parameters for `create`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct Create {
    /// Title of the new note.
    #[schemars(description = "Note title")]
    pub title: Option<String>,

    /// Markdown body. A leading `# <title>` heading is dropped.
    #[schemars(description = "Note body in Markdown")]
    pub text: Option<String>,

    /// Tags to attach.
    #[schemars(description = "Tags to add to the note")]
    pub tags: Option<Vec<String>>,

    /// Whether to pin the note.
    #[schemars(description = "Pin the note to the top of the list")]
    pub pin: Option<bool>,

    /// Whether to prepend the current date and time.
    #[schemars(description = "Prepend the current date and time to the text")]
    pub timestamp: Option<bool>,
}

/// Parameters for `add-text`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct AddText {
    /// Target note identifier.
    #[schemars(description = "Note unique identifier")]
    pub id: Option<String>,

    /// Target note title.
    #[schemars(description = "Note title (used when no id is given)")]
    pub title: Option<String>,

    /// Text to insert.
    #[schemars(description = "Text to add (required)")]
    pub text: Option<String>,

    /// Where the text goes (defaults to append in Bear).
    #[schemars(description = "prepend, append, replace (keeps title) or replace_all")]
    pub mode: Option<TextMode>,

    /// Header to insert under.
    #[schemars(description = "Add the text under this header inside the note")]
    pub header: Option<String>,

    /// Tags to add alongside the text.
    #[schemars(description = "Tags to add to the note")]
    pub tags: Option<Vec<String>>,

    /// Force the text onto a new line.
    #[schemars(description = "Always put the text on a new line when appending")]
    pub new_line: Option<bool>,

    /// Whether to prepend the current date and time.
    #[schemars(description = "Prepend the current date and time to the text")]
    pub timestamp: Option<bool>,
}

/// Parameters for `add-file`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct AddFile {
    /// Target note identifier.
    #[schemars(description = "Note unique identifier")]
    pub id: Option<String>,

    /// Target note title.
    #[schemars(description = "Note title (used when no id is given)")]
    pub title: Option<String>,

    /// Base64 file data, or an http(s) URL downloaded before dispatch.
    #[schemars(
        description = "Base64 representation of a file, or an http(s) URL to download it from (required)"
    )]
    pub file: Option<String>,

    /// File name including its extension.
    #[schemars(description = "File name with extension (required)")]
    pub filename: Option<String>,

    /// Header to insert under.
    #[schemars(description = "Add the file under this header inside the note")]
    pub header: Option<String>,

    /// Prepend or append.
    #[schemars(description = "prepend or append")]
    pub mode: Option<FileMode>,
}

impl AddFile {
    /// Whether `file` points at a remote resource rather than inline data.
    pub fn is_remote(&self) -> bool {
        self.file
            .as_deref()
            .map(|file| file.starts_with("http://") || file.starts_with("https://"))
            .unwrap_or(false)
    }
}

/// Parameters for `open-tag`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct OpenTag {
    /// Tag name, or a comma-separated list of tags.
    #[schemars(description = "Tag name, or several tags separated by commas (required)")]
    pub name: Option<String>,
}

/// Parameters for `rename-tag`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct RenameTag {
    /// Tag to rename. Also accepted as `old_name`.
    #[serde(alias = "old_name")]
    #[schemars(description = "Current tag name (required)")]
    pub name: Option<String>,

    /// Name the tag is renamed to.
    #[schemars(description = "New tag name (required)")]
    pub new_name: Option<String>,
}

/// Parameters for `delete-tag`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct DeleteTag {
    /// Tag to delete.
    #[schemars(description = "Tag name (required)")]
    pub name: Option<String>,
}

/// Identifies the note for `trash` and `archive`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct NoteTarget {
    /// Note identifier.
    #[schemars(description = "Note unique identifier")]
    pub id: Option<String>,

    /// Search term selecting the note.
    #[schemars(description = "Search term selecting the note (used when no id is given)")]
    pub search: Option<String>,
}

/// Optional filter for the sidebar listings (untagged, todo, today, locked).
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct SidebarSearch {
    /// Optional search filter.
    #[schemars(description = "String to search")]
    pub search: Option<String>,
}

/// Parameters for `search`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct Search {
    /// Search query text.
    #[schemars(description = "String to search")]
    pub term: Option<String>,

    /// Restrict the search to this tag.
    #[schemars(description = "Tag to search into")]
    pub tag: Option<String>,
}

/// Parameters for `grab-url`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct GrabUrl {
    /// Page to capture (http or https).
    #[schemars(description = "Web page to turn into a note (required)")]
    pub url: Option<String>,

    /// Tags for the new note.
    #[schemars(
        description = "Tags for the new note. Ignored if tags are set in Bear's web content preferences."
    )]
    pub tags: Option<Vec<String>>,

    /// Whether to pin the new note.
    #[schemars(description = "Pin the new note to the top of the list")]
    pub pin: Option<bool>,
}

// ============== Requests ==============

/// One Bear action together with its parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ActionRequest {
    OpenNote(OpenNote),
    Create(Create),
    AddText(AddText),
    AddFile(AddFile),
    Tags,
    OpenTag(OpenTag),
    RenameTag(RenameTag),
    DeleteTag(DeleteTag),
    Trash(NoteTarget),
    Archive(NoteTarget),
    Untagged(SidebarSearch),
    Todo(SidebarSearch),
    Today(SidebarSearch),
    Locked(SidebarSearch),
    Search(Search),
    GrabUrl(GrabUrl),
}

impl ActionRequest {
    pub fn action(&self) -> Action {
        match self {
            ActionRequest::OpenNote(_) => Action::OpenNote,
            ActionRequest::Create(_) => Action::Create,
            ActionRequest::AddText(_) => Action::AddText,
            ActionRequest::AddFile(_) => Action::AddFile,
            ActionRequest::Tags => Action::Tags,
            ActionRequest::OpenTag(_) => Action::OpenTag,
            ActionRequest::RenameTag(_) => Action::RenameTag,
            ActionRequest::DeleteTag(_) => Action::DeleteTag,
            ActionRequest::Trash(_) => Action::Trash,
            ActionRequest::Archive(_) => Action::Archive,
            ActionRequest::Untagged(_) => Action::Untagged,
            ActionRequest::Todo(_) => Action::Todo,
            ActionRequest::Today(_) => Action::Today,
            ActionRequest::Locked(_) => Action::Locked,
            ActionRequest::Search(_) => Action::Search,
            ActionRequest::GrabUrl(_) => Action::GrabUrl,
        }
    }

    /// Checks required and mutually exclusive fields.
    pub fn validate(&self) -> Result<(), BearError> {
        let action = self.action();
        match self {
            ActionRequest::OpenNote(p) => exactly_one(
                action,
                &[("id", &p.id), ("title", &p.title), ("search", &p.search)],
            ),
            ActionRequest::Create(p) => {
                if present(&p.title).is_none() && present(&p.text).is_none() {
                    return Err(BearError::InvalidParameters(
                        "create requires a title or text; empty notes are not allowed".into(),
                    ));
                }
                Ok(())
            }
            ActionRequest::AddText(p) => {
                exactly_one(action, &[("id", &p.id), ("title", &p.title)])?;
                require(action, "text", &p.text).map(|_| ())
            }
            ActionRequest::AddFile(p) => {
                exactly_one(action, &[("id", &p.id), ("title", &p.title)])?;
                require(action, "file", &p.file)?;
                require(action, "filename", &p.filename).map(|_| ())
            }
            ActionRequest::Tags => Ok(()),
            ActionRequest::OpenTag(p) => require(action, "name", &p.name).map(|_| ()),
            ActionRequest::RenameTag(p) => {
                require(action, "name", &p.name)?;
                require(action, "new_name", &p.new_name).map(|_| ())
            }
            ActionRequest::DeleteTag(p) => require(action, "name", &p.name).map(|_| ()),
            ActionRequest::Trash(p) | ActionRequest::Archive(p) => {
                exactly_one(action, &[("id", &p.id), ("search", &p.search)])
            }
            ActionRequest::Untagged(_)
            | ActionRequest::Todo(_)
            | ActionRequest::Today(_)
            | ActionRequest::Locked(_)
            | ActionRequest::Search(_) => Ok(()),
            ActionRequest::GrabUrl(p) => {
                let url = require(action, "url", &p.url)?;
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(BearError::InvalidParameters(format!(
                        "grab-url needs an http or https url, got '{url}'"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Validates the request and returns its canonical query parameters.
    ///
    /// Only supplied, non-blank values are emitted, in a fixed per-action
    /// order. The token and callback parameters are added later.
    pub fn query_params(&self) -> Result<QueryParams, BearError> {
        self.validate()?;

        let params = match self {
            ActionRequest::OpenNote(p) => Params::default()
                .text("id", &p.id)
                .text("title", &p.title)
                .text("search", &p.search)
                .text("header", &p.header)
                .flag("exclude_trashed", p.exclude_trashed),
            ActionRequest::Create(p) => Params::default()
                .text("title", &p.title)
                .text("text", &strip_title_heading(&p.title, &p.text))
                .list("tags", &p.tags)
                .flag("pin", p.pin)
                .flag("timestamp", p.timestamp),
            ActionRequest::AddText(p) => Params::default()
                .text("id", &p.id)
                .text("title", &p.title)
                .text("text", &p.text)
                .text("mode", &p.mode.map(|m| m.as_str().to_string()))
                .text("header", &p.header)
                .list("tags", &p.tags)
                .flag("new_line", p.new_line)
                .flag("timestamp", p.timestamp),
            ActionRequest::AddFile(p) => Params::default()
                .text("id", &p.id)
                .text("title", &p.title)
                .text("file", &p.file)
                .text("filename", &p.filename)
                .text("header", &p.header)
                .text("mode", &p.mode.map(|m| m.as_str().to_string())),
            ActionRequest::Tags => Params::default(),
            ActionRequest::OpenTag(p) => Params::default().text("name", &p.name),
            ActionRequest::RenameTag(p) => Params::default()
                .text("name", &p.name)
                .text("new_name", &p.new_name),
            ActionRequest::DeleteTag(p) => Params::default().text("name", &p.name),
            ActionRequest::Trash(p) | ActionRequest::Archive(p) => Params::default()
                .text("id", &p.id)
                .text("search", &p.search),
            ActionRequest::Untagged(p)
            | ActionRequest::Todo(p)
            | ActionRequest::Today(p)
            | ActionRequest::Locked(p) => Params::default().text("search", &p.search),
            ActionRequest::Search(p) => Params::default()
                .text("term", &p.term)
                .text("tag", &p.tag),
            ActionRequest::GrabUrl(p) => Params::default()
                .text("url", &p.url)
                .list("tags", &p.tags)
                .flag("pin", p.pin),
        };

        Ok(params.finish())
    }
}

// ============== Helpers ==============

/// Collects query parameters, dropping absent values.
#[derive(Default)]
struct Params(QueryParams);

impl Params {
    fn text(mut self, key: &'static str, value: &Option<String>) -> Self {
        if let Some(value) = present(value) {
            self.0.push((key, value.to_string()));
        }
        self
    }

    fn flag(mut self, key: &'static str, value: Option<bool>) -> Self {
        if let Some(value) = value {
            self.0.push((key, yes_no(value).to_string()));
        }
        self
    }

    fn list(mut self, key: &'static str, values: &Option<Vec<String>>) -> Self {
        let joined = values
            .iter()
            .flatten()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .collect::<Vec<_>>()
            .join(",");
        if !joined.is_empty() {
            self.0.push((key, joined));
        }
        self
    }

    fn finish(self) -> QueryParams {
        self.0
    }
}

/// Bear's boolean tokens.
pub fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Returns the value if it is set and not blank.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn require<'a>(
    action: Action,
    field: &str,
    value: &'a Option<String>,
) -> Result<&'a str, BearError> {
    present(value).ok_or_else(|| {
        BearError::InvalidParameters(format!("{action} requires '{field}'"))
    })
}

fn exactly_one(action: Action, fields: &[(&str, &Option<String>)]) -> Result<(), BearError> {
    let supplied: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| present(value).is_some())
        .map(|(name, _)| *name)
        .collect();
    let names = fields
        .iter()
        .map(|(name, _)| format!("'{name}'"))
        .collect::<Vec<_>>()
        .join(", ");

    match supplied.len() {
        1 => Ok(()),
        0 => Err(BearError::InvalidParameters(format!(
            "{action} requires one of {names}"
        ))),
        _ => Err(BearError::InvalidParameters(format!(
            "{action} accepts only one of {names}, got {}",
            supplied.join(" and ")
        ))),
    }
}

/// Drops a leading `# <title>` heading so Bear does not show the title twice.
fn strip_title_heading(title: &Option<String>, text: &Option<String>) -> Option<String> {
    let text = text.as_deref()?;
    match present(title) {
        Some(title) => {
            let heading = format!("# {title}");
            Some(text.strip_prefix(&heading).unwrap_or(text).to_string())
        }
        None => Some(text.to_string()),
    }
}
