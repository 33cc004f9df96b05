use dioxus::prelude::*;

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonVariant {
    #[default]
    Primary,
    Subtle,
    Danger,
}

impl ButtonVariant {
    fn class(&self) -> &'static str {
        match self {
            ButtonVariant::Primary => "bg-sky-600 text-white hover:bg-sky-500 focus:ring-sky-500",
            ButtonVariant::Subtle => "bg-transparent text-slate-300 hover:bg-slate-700 hover:text-white focus:ring-slate-500",
            ButtonVariant::Danger => "bg-transparent text-rose-300 hover:bg-rose-900/40 hover:text-rose-100 focus:ring-rose-500",
        }
    }
}

#[derive(Props, Clone, PartialEq)]
pub struct ButtonProps {
    #[props(optional)]
    pub class: Option<String>,
    #[props(default)]
    pub variant: ButtonVariant,
    #[props(optional)]
    pub title: Option<String>,
    #[props(default)]
    pub disabled: bool,
    #[props(optional)]
    pub onclick: Option<EventHandler<MouseEvent>>,
    pub children: Element,
}

#[component]
pub fn Button(props: ButtonProps) -> Element {
    let disabled = props.disabled;
    let base = "inline-flex items-center justify-center rounded-md px-3 py-1.5 text-xs font-medium transition-colors focus:outline-none focus:ring-2 disabled:opacity-50 disabled:pointer-events-none";

    let class = match &props.class {
        Some(extra) if !extra.is_empty() => format!("{} {} {}", base, props.variant.class(), extra),
        _ => format!("{} {}", base, props.variant.class()),
    };

    rsx! {
        button {
            class,
            r#type: "button",
            title: props.title.clone().unwrap_or_default(),
            disabled,
            onclick: move |evt| {
                if let Some(handler) = &props.onclick {
                    handler.call(evt);
                }
            },
            {props.children}
        }
    }
}
