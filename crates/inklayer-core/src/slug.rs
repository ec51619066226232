//! Path-derived identifiers: slugs, default ids and artifact names.

/// Convert text to a URL-safe slug.
///
/// Lowercases, collapses every run of non-alphanumeric characters into a single
/// hyphen and trims hyphens from both ends. Stateless: the same heading twice
/// yields the same slug twice.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Normalize a relative path: `/` separators, no empty or `.` segments.
pub fn normalize_path(relative_path: &str) -> String {
    relative_path
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Default document id: the normalized relative path, extension included.
pub fn default_id(relative_path: &str) -> String {
    normalize_path(relative_path)
}

/// Derive a slug from a path relative to the content root.
///
/// ```
/// use inklayer_core::slug::generate;
///
/// assert_eq!(generate("en/posts/my-first-post.md"), "en/posts/my-first-post");
/// assert_eq!(generate("en/docs/index.md"), "en/docs");
/// assert_eq!(generate("index.md"), "");
/// ```
pub fn generate(relative_path: &str) -> String {
    let normalized = normalize_path(relative_path);
    let without_ext = strip_extension(&normalized);

    let mut segments: Vec<String> = without_ext
        .split('/')
        .map(slugify)
        .filter(|segment| !segment.is_empty())
        .collect();

    if segments.last().is_some_and(|last| last == "index") {
        segments.pop();
    }

    segments.join("/")
}

/// Strip the extension of the final path segment. Dotfiles keep their name.
fn strip_extension(path: &str) -> &str {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[name_start..].rfind('.') {
        Some(dot) if dot > 0 => &path[..name_start + dot],
        _ => path,
    }
}

/// File name (without `.json`) used for a document's artifact.
///
/// Ids starting with a digit get a `_` prefix and `/` becomes `__`.
pub fn id_to_file_name(id: &str) -> String {
    let mangled = id.replace('/', "__");
    if id.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{mangled}")
    } else {
        mangled
    }
}

/// Name of the aggregate holding every document of a type, e.g. `allPosts`.
pub fn data_variable_name(doc_type: &str) -> String {
    let plural = pluralize(doc_type);
    let pascal: String = plural
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect();
    format!("all{pascal}")
}

fn pluralize(word: &str) -> String {
    let lower = word.to_lowercase();
    if let Some(stem) = word.strip_suffix(['y', 'Y'])
        && !stem.ends_with(['a', 'e', 'i', 'o', 'u'])
        && !stem.is_empty()
    {
        return format!("{stem}ies");
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|s| lower.ends_with(s)) {
        return format!("{word}es");
    }
    format!("{word}s")
}
