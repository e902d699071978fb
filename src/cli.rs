use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::items::Collection;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only links of this category
    #[clap(long)]
    pub category: Option<String>,

    /// Only links from this platform (e.g. GitHub, YouTube)
    #[clap(long)]
    pub platform: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the dashboard API and follow store changes.
    Daemon {
        /// Listen address, overrides SMEM_ADDR
        #[clap(long)]
        addr: Option<String>,
    },

    /// Find saved items related to a query
    Search {
        /// Free text query
        query: String,

        /// Restrict output to one collection
        #[clap(short = 'k', long)]
        kind: Option<Collection>,

        #[clap(flatten)]
        filters: FilterArgs,

        /// Print the count
        #[clap(short = 'c', long, default_value = "false")]
        count: bool,
    },

    /// List saved items, newest first
    List {
        #[clap(short = 'k', long)]
        kind: Option<Collection>,

        #[clap(flatten)]
        filters: FilterArgs,

        /// Print categories, platforms and tags instead of items
        #[clap(long, default_value = "false")]
        facets: bool,
    },

    /// Delete one item
    Delete {
        #[clap(short = 'k', long, default_value = "links")]
        kind: Collection,

        id: String,
    },

    /// Print where an item opens (page, image or PDF url)
    Open {
        #[clap(short = 'k', long, default_value = "links")]
        kind: Collection,

        id: String,
    },

    /// Show the reader-mode text of a saved link
    Read { id: String },

    /// Export all links as JSON
    Export {
        /// Directory to write the export file into; stdout if absent
        #[clap(short, long)]
        dir: Option<PathBuf>,
    },

    /// Save a link
    Save {
        /// a url
        #[clap(allow_hyphen_values = true)]
        url: String,

        #[clap(short, long, default_value = "")]
        title: String,

        #[clap(short, long, default_value = "")]
        note: String,

        /// Comma separated tags
        #[clap(short = 'g', long, default_value = "")]
        tags: String,

        #[clap(long)]
        category: Option<String>,

        #[clap(long)]
        platform: Option<String>,

        /// Fetch the page and keep its readable text
        #[clap(short, long, default_value = "false")]
        reader: bool,

        /// Save with quick-save defaults, ignoring other fields
        #[clap(short, long, default_value = "false")]
        quick: bool,

        /// Save a link found on the page with this title, ignoring other fields
        #[clap(long, conflicts_with = "quick")]
        from_page: Option<String>,
    },

    /// Save a text selection from a page
    Clip {
        url: String,

        /// Selected text
        text: String,

        #[clap(short, long, default_value = "")]
        title: String,
    },

    /// Upload a PNG screenshot and extract its text
    Screenshot {
        /// PNG file
        file: PathBuf,

        /// Page the screenshot was taken from
        #[clap(short, long, default_value = "")]
        url: String,

        #[clap(short, long, default_value = "")]
        title: String,
    },

    /// Upload a PDF, extract and summarize it
    Pdf {
        /// PDF file
        file: PathBuf,

        /// Where the PDF came from
        #[clap(short, long, default_value = "")]
        url: String,

        #[clap(short, long)]
        title: Option<String>,
    },

    /// Print a line for every store change until interrupted
    Watch {},
}
