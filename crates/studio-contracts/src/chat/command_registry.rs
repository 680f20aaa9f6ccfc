#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
    /// Key under which the argument is stored in `command_args`.
    pub arg: &'static str,
}

/// Commands whose whole tail is one free-text value.
pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "mode",
        action: "set_mode",
        arg: "mode",
    },
    CommandSpec {
        command: "create",
        action: "set_create_function",
        arg: "function",
    },
    CommandSpec {
        command: "edit",
        action: "set_edit_function",
        arg: "function",
    },
    CommandSpec {
        command: "ratio",
        action: "set_ratio",
        arg: "ratio",
    },
    CommandSpec {
        command: "negative",
        action: "set_negative",
        arg: "text",
    },
    CommandSpec {
        command: "effect",
        action: "set_effect_text",
        arg: "text",
    },
    CommandSpec {
        command: "style",
        action: "set_effect_style",
        arg: "style",
    },
];

/// Commands taking one whole number.
pub(crate) const NUMBER_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "blur",
        action: "set_blur",
        arg: "amount",
    },
    CommandSpec {
        command: "use",
        action: "select_history",
        arg: "index",
    },
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "image1",
        action: "set_image1",
        arg: "path",
    },
    CommandSpec {
        command: "image2",
        action: "set_image2",
        arg: "path",
    },
    CommandSpec {
        command: "save",
        action: "save",
        arg: "path",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "help",
        action: "help",
        arg: "",
    },
    CommandSpec {
        command: "go",
        action: "submit",
        arg: "",
    },
    CommandSpec {
        command: "upscale",
        action: "upscale",
        arg: "",
    },
    CommandSpec {
        command: "history",
        action: "list_images",
        arg: "",
    },
    CommandSpec {
        command: "prompts",
        action: "list_prompts",
        arg: "",
    },
    CommandSpec {
        command: "edit_current",
        action: "edit_current",
        arg: "",
    },
    CommandSpec {
        command: "clear_history",
        action: "clear_images",
        arg: "",
    },
    CommandSpec {
        command: "clear_prompts",
        action: "clear_prompts",
        arg: "",
    },
    CommandSpec {
        command: "new",
        action: "reset",
        arg: "",
    },
    CommandSpec {
        command: "status",
        action: "status",
        arg: "",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
        arg: "",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
        arg: "",
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/mode create|edit",
    "/create free|sticker|text|comic|text-effect",
    "/edit add-remove|retouch|style|compose|upscale|blur",
    "/ratio 1:1|16:9|9:16|4:3|3:4",
    "/negative <text>",
    "/effect <text>",
    "/style <neon|glowing|3d metallic|fire|wood|custom>",
    "/blur <0-100>",
    "/image1 <path>",
    "/image2 <path>",
    "/go",
    "/upscale",
    "/history",
    "/prompts",
    "/use <n>",
    "/save [path]",
    "/edit_current",
    "/clear_history",
    "/clear_prompts",
    "/new",
    "/status",
    "/quit",
];
