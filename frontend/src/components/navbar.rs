use crate::{Model, Msg, Page};
use yew::html::Scope;
use yew::prelude::*;

pub fn render_navbar(model: &Model, ctx: &Context<Model>) -> Html {
    let link = ctx.link();
    let current_batch = model.store.current_batch().map(|b| b.id.clone());
    let on_processing = matches!(model.page, Page::Processing(_));

    html! {
        <header class="app-header">
            <h1><i class="fa-solid fa-wand-magic-sparkles"></i> {" Retouch Studio"}</h1>
            <nav class="nav-links">
                { nav_button(link, "Upload", "fa-upload", model.page == Page::Upload, Some(Page::Upload)) }
                { nav_button(link, "Processing", "fa-spinner", on_processing, current_batch.map(Page::Processing)) }
                { nav_button(link, "Integrations", "fa-plug", model.page == Page::Integrations, Some(Page::Integrations)) }
                { nav_button(link, "Activity", "fa-clock-rotate-left", model.page == Page::Activity, Some(Page::Activity)) }
            </nav>
            { render_session(model, ctx) }
        </header>
    }
}

fn nav_button(
    link: &Scope<Model>,
    label: &'static str,
    icon: &'static str,
    active: bool,
    target: Option<Page>,
) -> Html {
    let disabled = target.is_none();
    let onclick = link.batch_callback(move |_: MouseEvent| target.clone().map(Msg::Navigate));
    html! {
        <button
            class={classes!("nav-link", active.then_some("active"))}
            {disabled}
            {onclick}
        >
            <i class={classes!("fa-solid", icon)}></i>{ format!(" {}", label) }
        </button>
    }
}

fn render_session(model: &Model, ctx: &Context<Model>) -> Html {
    if !model.session.is_authenticated() {
        return html! {
            <div class="session guest">
                <i class="fa-regular fa-user"></i>{ format!(" {}", model.session.display_name()) }
            </div>
        };
    }

    let picture = model
        .session
        .user
        .as_ref()
        .and_then(|u| u.picture_url.clone());
    html! {
        <div class="session">
            if let Some(src) = picture {
                <img class="avatar" {src} alt="avatar" />
            }
            <span class="user-name">{ model.session.display_name() }</span>
            <button class="sign-out-btn" onclick={ctx.link().callback(|_| Msg::SignOut)}>
                <i class="fa-solid fa-right-from-bracket"></i>{" Sign out"}
            </button>
        </div>
    }
}
