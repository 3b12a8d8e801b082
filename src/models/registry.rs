use std::fmt;

/// Destination category inside the staging root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Checkpoints,
    Loras,
    Vae,
    HuggingFace,
}

/// Information about a staging category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryInfo {
    pub category: Category,
    /// Subdirectory under the staging root
    pub dir_name: &'static str,
    /// Plural label used in log lines
    pub label: &'static str,
    /// Environment variable holding the id list
    pub env_var: &'static str,
}

/// Registry of staging categories, in processing order
pub const CATEGORIES: &[CategoryInfo] = &[
    CategoryInfo {
        category: Category::HuggingFace,
        dir_name: "huggingface",
        label: "Hugging Face repos",
        env_var: "HF_REPOS_TO_DOWNLOAD",
    },
    CategoryInfo {
        category: Category::Checkpoints,
        dir_name: "checkpoints",
        label: "Civitai checkpoints",
        env_var: "CIVITAI_CHECKPOINTS_TO_DOWNLOAD",
    },
    CategoryInfo {
        category: Category::Loras,
        dir_name: "loras",
        label: "Civitai loras",
        env_var: "CIVITAI_LORAS_TO_DOWNLOAD",
    },
    CategoryInfo {
        category: Category::Vae,
        dir_name: "vae",
        label: "Civitai vaes",
        env_var: "CIVITAI_VAES_TO_DOWNLOAD",
    },
];

impl Category {
    /// Civitai categories, in processing order
    pub const CIVITAI: [Self; 3] = [Self::Checkpoints, Self::Loras, Self::Vae];

    #[must_use]
    pub fn info(self) -> &'static CategoryInfo {
        CATEGORIES
            .iter()
            .find(|info| info.category == self)
            .unwrap_or(&CATEGORIES[0])
    }

    #[must_use]
    pub fn dir_name(self) -> &'static str {
        self.info().dir_name
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        self.info().label
    }

    /// Find category by directory name
    #[must_use]
    pub fn from_dir_name(name: &str) -> Option<Self> {
        CATEGORIES
            .iter()
            .find(|info| info.dir_name == name)
            .map(|info| info.category)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}
